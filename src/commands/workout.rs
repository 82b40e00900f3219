use chrono::{DateTime, Datelike, Utc};
use tracing::info;

use crate::models::{NewPerformanceLog, PerformanceLog, WorkoutSession};
use crate::session_engine::{DEFAULT_HISTORY_LIMIT, DEFAULT_RECENT_LOG_LIMIT};
use crate::AppState;

/// 1 = Monday .. 7 = Sunday
pub fn day_of_week(now: DateTime<Utc>) -> u8 {
  now.weekday().number_from_monday() as u8
}

/// ---------------------------------------------------------------------------
/// Today's Session
/// ---------------------------------------------------------------------------

/// Today's session for the current user, created on first access
pub async fn get_today_session(state: &AppState, routine_id: &str) -> Result<WorkoutSession, String> {
  let user_id = state.identity.get_current_user_id().await;
  state
    .sessions
    .get_current_session(&user_id, routine_id, day_of_week(Utc::now()))
    .await
    .map_err(|e| e.to_string())
}

/// Check or uncheck an exercise, completing the session once all
/// `total_exercises` are checked
pub async fn toggle_exercise(
  state: &AppState,
  routine_id: &str,
  exercise_id: &str,
  total_exercises: usize,
) -> Result<WorkoutSession, String> {
  let session = get_today_session(state, routine_id).await?;

  let toggled = state
    .sessions
    .toggle_exercise_completion(&session, exercise_id)
    .await
    .map_err(|e| e.to_string())?;

  state
    .sessions
    .complete_session_if_all_done(&toggled, total_exercises)
    .await
    .map_err(|e| e.to_string())
}

/// ---------------------------------------------------------------------------
/// Performance Logs
/// ---------------------------------------------------------------------------

/// Record a set for the current user. The entry's user id is overwritten.
pub async fn log_set(state: &AppState, mut entry: NewPerformanceLog) -> Result<PerformanceLog, String> {
  entry.user_id = state.identity.get_current_user_id().await;
  state
    .sessions
    .log_performance(entry)
    .await
    .map_err(|e| e.to_string())
}

pub async fn get_recent_logs(
  state: &AppState,
  exercise_id: &str,
  limit: Option<usize>,
) -> Result<Vec<PerformanceLog>, String> {
  let user_id = state.identity.get_current_user_id().await;
  Ok(
    state
      .sessions
      .get_recent_performance_logs(&user_id, exercise_id, limit.unwrap_or(DEFAULT_RECENT_LOG_LIMIT))
      .await,
  )
}

pub async fn get_session_history(
  state: &AppState,
  limit: Option<usize>,
) -> Result<Vec<WorkoutSession>, String> {
  let user_id = state.identity.get_current_user_id().await;
  Ok(
    state
      .sessions
      .get_session_history(&user_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
      .await,
  )
}

/// ---------------------------------------------------------------------------
/// Reset
/// ---------------------------------------------------------------------------

/// Wipe local workout data and sync bookkeeping. The user id is kept.
pub async fn reset_local_data(state: &AppState) -> Result<(), String> {
  state
    .sessions
    .clear_all_data()
    .await
    .map_err(|e| format!("Failed to clear workout data: {}", e))?;

  state
    .sync
    .clear_sync_data()
    .await
    .map_err(|e| format!("Failed to clear sync data: {}", e))?;

  info!("Local data reset");
  Ok(())
}
