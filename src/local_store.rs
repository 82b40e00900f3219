//! Local session store
//!
//! Persists today's session per user, a bounded history of completed sessions,
//! and a bounded rolling log of performance entries. Reads tolerate corrupted
//! JSON by treating it as "no data"; writes surface their failures.

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::models::{PerformanceLog, StoredSession, WorkoutSession};
use crate::storage::{KeyValueStore, StorageError};

/// ---------------------------------------------------------------------------
/// Storage Keys and Bounds
/// ---------------------------------------------------------------------------

pub const CURRENT_SESSION_PREFIX: &str = "workout_current_session";
pub const SESSION_HISTORY_KEY: &str = "workout_session_history";
pub const PERFORMANCE_LOGS_KEY: &str = "workout_performance_logs";
pub const SYNC_QUEUE_KEY: &str = "workout_sync_queue";

pub const HISTORY_RETENTION_DAYS: i64 = 30;
pub const MAX_PERFORMANCE_LOGS: usize = 100;

pub fn current_session_key(user_id: &str, workout_date: NaiveDate) -> String {
  format!(
    "{}_{}_{}",
    CURRENT_SESSION_PREFIX,
    user_id,
    workout_date.format("%Y-%m-%d")
  )
}

#[derive(Clone)]
pub struct LocalSessionStore {
  store: Arc<dyn KeyValueStore>,
}

impl LocalSessionStore {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self { store }
  }

  /// Read and decode a JSON value. Missing and corrupted values are both `None`;
  /// only the storage read itself can fail.
  async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
    let Some(raw) = self.store.get_item(key).await? else {
      return Ok(None);
    };

    match serde_json::from_str(&raw) {
      Ok(value) => Ok(Some(value)),
      Err(e) => {
        warn!(key, error = %e, "Ignoring corrupted stored value");
        Ok(None)
      }
    }
  }

  /// Read a JSON array, dropping only the elements that fail to decode
  async fn read_json_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StorageError> {
    let entries: Vec<serde_json::Value> = self.read_json(key).await?.unwrap_or_default();

    Ok(
      entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value(entry) {
          Ok(value) => Some(value),
          Err(e) => {
            warn!(key, index, error = %e, "Skipping undecodable stored entry");
            None
          }
        })
        .collect(),
    )
  }

  async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
    let raw = serde_json::to_string(value)?;
    self.store.set_item(key, &raw).await
  }

  /// -------------------------------------------------------------------------
  /// Current Session
  /// -------------------------------------------------------------------------

  pub async fn load_current_session(
    &self,
    user_id: &str,
    workout_date: NaiveDate,
  ) -> Result<Option<WorkoutSession>, StorageError> {
    let key = current_session_key(user_id, workout_date);
    let stored: Option<StoredSession> = self.read_json(&key).await?;
    Ok(stored.map(WorkoutSession::from))
  }

  pub async fn save_current_session(&self, session: &WorkoutSession) -> Result<(), StorageError> {
    let key = current_session_key(&session.user_id, session.workout_date);
    self.write_json(&key, &StoredSession::from(session)).await?;
    debug!(key = %key, completed = session.completed_count(), "Saved current session");
    Ok(())
  }

  /// -------------------------------------------------------------------------
  /// Session History
  /// -------------------------------------------------------------------------

  /// Append a completed-session snapshot, dropping entries older than the
  /// retention window relative to `today`. A snapshot with the same session id
  /// is replaced, so retrying after a partial failure never duplicates it.
  pub async fn append_to_history(
    &self,
    session: &WorkoutSession,
    today: NaiveDate,
  ) -> Result<(), StorageError> {
    let mut history: Vec<StoredSession> = self.read_json_list(SESSION_HISTORY_KEY).await?;

    history.retain(|s| s.id != session.id);
    history.push(StoredSession::from(session));

    let cutoff = today - Duration::days(HISTORY_RETENTION_DAYS);
    history.retain(|s| s.workout_date >= cutoff);

    self.write_json(SESSION_HISTORY_KEY, &history).await?;
    info!(session_id = %session.id, entries = history.len(), "Added session to history");
    Ok(())
  }

  /// Completed sessions for a user, newest workout date first
  pub async fn get_session_history(&self, user_id: &str, limit: usize) -> Vec<WorkoutSession> {
    let history: Vec<StoredSession> = match self.read_json_list(SESSION_HISTORY_KEY).await {
      Ok(history) => history,
      Err(e) => {
        warn!(error = %e, "Failed to read session history");
        return Vec::new();
      }
    };

    let mut sessions: Vec<WorkoutSession> = history
      .into_iter()
      .filter(|s| s.user_id == user_id)
      .map(WorkoutSession::from)
      .collect();

    sessions.sort_by(|a, b| b.workout_date.cmp(&a.workout_date));
    sessions.truncate(limit);
    sessions
  }

  /// -------------------------------------------------------------------------
  /// Performance Logs
  /// -------------------------------------------------------------------------

  /// Append a log, keeping only the most recent entries
  pub async fn save_performance_log(&self, log: &PerformanceLog) -> Result<(), StorageError> {
    let mut logs: Vec<PerformanceLog> = self.read_json_list(PERFORMANCE_LOGS_KEY).await?;

    logs.push(log.clone());
    if logs.len() > MAX_PERFORMANCE_LOGS {
      let excess = logs.len() - MAX_PERFORMANCE_LOGS;
      logs.drain(..excess);
    }

    self.write_json(PERFORMANCE_LOGS_KEY, &logs).await?;
    info!(log_id = %log.id, exercise_id = %log.exercise_id, "Saved performance log");
    Ok(())
  }

  async fn load_performance_logs(&self) -> Vec<PerformanceLog> {
    match self.read_json_list(PERFORMANCE_LOGS_KEY).await {
      Ok(logs) => logs,
      Err(e) => {
        warn!(error = %e, "Failed to read performance logs");
        Vec::new()
      }
    }
  }

  fn newest_first(mut logs: Vec<PerformanceLog>, limit: usize) -> Vec<PerformanceLog> {
    logs.sort_by(|a, b| b.logged_at.cmp(&a.logged_at));
    logs.truncate(limit);
    logs
  }

  pub async fn get_recent_performance_logs(
    &self,
    user_id: &str,
    exercise_id: &str,
    limit: usize,
  ) -> Vec<PerformanceLog> {
    let logs = self
      .load_performance_logs()
      .await
      .into_iter()
      .filter(|log| log.user_id == user_id && log.exercise_id == exercise_id)
      .collect();

    Self::newest_first(logs, limit)
  }

  /// Every log for a user, newest first. Feeds the sync upload phase.
  pub async fn get_all_performance_logs(&self, user_id: &str, limit: usize) -> Vec<PerformanceLog> {
    let logs = self
      .load_performance_logs()
      .await
      .into_iter()
      .filter(|log| log.user_id == user_id)
      .collect();

    Self::newest_first(logs, limit)
  }

  /// -------------------------------------------------------------------------
  /// Reset
  /// -------------------------------------------------------------------------

  /// Wipe sessions, history, logs and sync-queue bookkeeping
  pub async fn clear_all_data(&self) -> Result<(), StorageError> {
    let mut keys: Vec<String> = self
      .store
      .all_keys()
      .await?
      .into_iter()
      .filter(|key| key.starts_with(CURRENT_SESSION_PREFIX))
      .collect();

    keys.extend(
      [SESSION_HISTORY_KEY, PERFORMANCE_LOGS_KEY, SYNC_QUEUE_KEY]
        .iter()
        .map(|k| k.to_string()),
    );

    self.store.multi_remove(&keys).await?;
    info!(removed = keys.len(), "Cleared local workout data");
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
