//! Session state engine
//!
//! Owns every mutation of a day's workout session:
//! - lazily creates today's session (one per user per calendar date)
//! - toggles exercise completion
//! - promotes a session to Completed once every exercise is checked off
//!
//! Every mutation is persisted before it returns. A session whose write failed
//! is not handed back as if it had been saved.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::local_store::LocalSessionStore;
use crate::models::{NewPerformanceLog, PerformanceLog, SessionStatus, ValidationError, WorkoutSession};
use crate::storage::StorageError;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_RECENT_LOG_LIMIT: usize = 5;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
  #[error("Failed to persist workout state: {0}")]
  Storage(#[from] StorageError),

  #[error("Invalid performance log: {0}")]
  Validation(#[from] ValidationError),

  #[error("Day of week must be between 1 (Monday) and 7 (Sunday), got {0}")]
  InvalidDayOfWeek(u8),
}

impl Serialize for SessionError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// Calendar date a timestamp falls on. Sessions are keyed by UTC date.
pub fn workout_date(now: DateTime<Utc>) -> NaiveDate {
  now.date_naive()
}

/// ---------------------------------------------------------------------------
/// Engine
/// ---------------------------------------------------------------------------

pub struct SessionEngine {
  store: LocalSessionStore,
  // Serializes get-or-create so two first calls on a day cannot both create
  create_lock: Mutex<()>,
}

impl SessionEngine {
  pub fn new(store: LocalSessionStore) -> Self {
    Self {
      store,
      create_lock: Mutex::new(()),
    }
  }

  pub fn store(&self) -> &LocalSessionStore {
    &self.store
  }

  /// Today's session for the user, created and persisted if none exists yet
  pub async fn get_current_session(
    &self,
    user_id: &str,
    routine_id: &str,
    day_of_week: u8,
  ) -> Result<WorkoutSession, SessionError> {
    self
      .get_current_session_at(user_id, routine_id, day_of_week, Utc::now())
      .await
  }

  pub async fn get_current_session_at(
    &self,
    user_id: &str,
    routine_id: &str,
    day_of_week: u8,
    now: DateTime<Utc>,
  ) -> Result<WorkoutSession, SessionError> {
    if !(1..=7).contains(&day_of_week) {
      return Err(SessionError::InvalidDayOfWeek(day_of_week));
    }

    let _guard = self.create_lock.lock().await;
    let today = workout_date(now);

    if let Some(existing) = self.store.load_current_session(user_id, today).await? {
      debug!(session_id = %existing.id, "Loaded existing workout session");
      return Ok(existing);
    }

    let session = WorkoutSession::new(user_id, routine_id, today, day_of_week, now);
    self.store.save_current_session(&session).await?;
    info!(session_id = %session.id, routine_id, day_of_week, "Created workout session");
    Ok(session)
  }

  /// Status for a date without creating anything
  pub async fn session_status(
    &self,
    user_id: &str,
    date: NaiveDate,
  ) -> Result<SessionStatus, SessionError> {
    let status = self
      .store
      .load_current_session(user_id, date)
      .await?
      .map_or(SessionStatus::NotStarted, |session| session.status());
    Ok(status)
  }

  /// Add the exercise if absent, remove it if present, then persist.
  /// Ids are not checked against the routine; that is the caller's job.
  pub async fn toggle_exercise_completion(
    &self,
    session: &WorkoutSession,
    exercise_id: &str,
  ) -> Result<WorkoutSession, SessionError> {
    let mut updated = session.clone();
    let now_completed = updated.completed_exercises.toggle(exercise_id);

    self.store.save_current_session(&updated).await?;
    info!(
      session_id = %updated.id,
      exercise_id,
      completed = now_completed,
      "Toggled exercise"
    );
    Ok(updated)
  }

  /// Mark the session completed when every exercise is checked off.
  /// Idempotent: an already-completed session comes back unchanged.
  pub async fn complete_session_if_all_done(
    &self,
    session: &WorkoutSession,
    total_exercise_count: usize,
  ) -> Result<WorkoutSession, SessionError> {
    self
      .complete_session_if_all_done_at(session, total_exercise_count, Utc::now())
      .await
  }

  pub async fn complete_session_if_all_done_at(
    &self,
    session: &WorkoutSession,
    total_exercise_count: usize,
    now: DateTime<Utc>,
  ) -> Result<WorkoutSession, SessionError> {
    if session.is_completed || !session.all_done(total_exercise_count) {
      return Ok(session.clone());
    }

    let mut completed = session.clone();
    completed.is_completed = true;
    completed.completed_at = Some(now);

    // History first: if the current-session write then fails, the stored
    // session is still incomplete and a retry rewrites the same snapshot
    self.store.append_to_history(&completed, workout_date(now)).await?;
    self.store.save_current_session(&completed).await?;

    info!(
      session_id = %completed.id,
      exercises = total_exercise_count,
      "Workout session completed"
    );
    Ok(completed)
  }

  /// -------------------------------------------------------------------------
  /// Performance Logging
  /// -------------------------------------------------------------------------

  /// Validate, stamp and store a set. Invalid input is rejected before any I/O.
  pub async fn log_performance(&self, entry: NewPerformanceLog) -> Result<PerformanceLog, SessionError> {
    self.log_performance_at(entry, Utc::now()).await
  }

  pub async fn log_performance_at(
    &self,
    entry: NewPerformanceLog,
    now: DateTime<Utc>,
  ) -> Result<PerformanceLog, SessionError> {
    let log = entry.into_log(Uuid::new_v4().to_string(), now)?;
    self.store.save_performance_log(&log).await?;
    Ok(log)
  }

  pub async fn get_recent_performance_logs(
    &self,
    user_id: &str,
    exercise_id: &str,
    limit: usize,
  ) -> Vec<PerformanceLog> {
    self
      .store
      .get_recent_performance_logs(user_id, exercise_id, limit)
      .await
  }

  pub async fn get_session_history(&self, user_id: &str, limit: usize) -> Vec<WorkoutSession> {
    self.store.get_session_history(user_id, limit).await
  }

  pub async fn clear_all_data(&self) -> Result<(), SessionError> {
    self.store.clear_all_data().await?;
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
