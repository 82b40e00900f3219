//! Two-phase synchronization with the hosted database
//!
//! A full sync checks connectivity, uploads local performance logs, downloads
//! the user's recent remote logs and only then records the sync time. Every
//! failure is reported through `SyncOutcome`; nothing local is rolled back.
//!
//! Remote `workout_logs` rows carry no reference to the local log id, so an
//! upload is treated as a duplicate when the remote store already has a log
//! for the same user and exercise within `DEDUP_WINDOW_SECONDS` of it.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::catalog::{timestamp, WorkoutCatalog, EXERCISES};
use crate::gateway::{GatewayError, TableQuery};
use crate::identity::IdentityProvider;
use crate::local_store::LocalSessionStore;
use crate::models::{NewWorkoutLogRow, PerformanceLog, SyncOutcome, SyncStatus, UploadReport, WorkoutLogRow};
use crate::storage::{KeyValueStore, StorageError};

/// ---------------------------------------------------------------------------
/// Constants
/// ---------------------------------------------------------------------------

pub const LAST_SYNC_KEY: &str = "last_sync_timestamp";
pub const SYNC_STATUS_KEY: &str = "sync_status";

pub const DEDUP_WINDOW_SECONDS: i64 = 60;
pub const AUTO_SYNC_INTERVAL_HOURS: i64 = 24;
pub const DOWNLOAD_WINDOW_DAYS: i64 = 30;
pub const DOWNLOAD_LIMIT: usize = 100;
pub const UPLOAD_BATCH_LIMIT: usize = 100;
/// History entries counted as pending in `get_sync_status`
pub const PENDING_HISTORY_LIMIT: usize = 30;

const MSG_OFFLINE: &str = "Check your network connection and try again.";
const MSG_IN_PROGRESS: &str = "A sync is already in progress.";

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  #[error("Remote request failed: {0}")]
  Gateway(#[from] GatewayError),

  #[error("Local storage failed: {0}")]
  Storage(#[from] StorageError),

  #[error("Merging remote logs failed: {0}")]
  Merge(String),
}

impl Serialize for SyncError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Download Merge
/// ---------------------------------------------------------------------------

/// Hook for folding downloaded remote logs back into local state
#[async_trait]
pub trait RemoteLogMerge: Send + Sync {
  async fn merge(&self, _user_id: &str, _rows: &[WorkoutLogRow]) -> Result<(), SyncError> {
    Ok(())
  }
}

/// Leaves local data untouched; downloaded rows are only returned to the caller
pub struct KeepLocal;

impl RemoteLogMerge for KeepLocal {}

/// ---------------------------------------------------------------------------
/// Sync Service
/// ---------------------------------------------------------------------------

pub struct SyncService {
  catalog: WorkoutCatalog,
  local: LocalSessionStore,
  store: Arc<dyn KeyValueStore>,
  identity: Arc<IdentityProvider>,
  merge: Box<dyn RemoteLogMerge>,
  sync_lock: Mutex<()>,
}

impl SyncService {
  pub fn new(
    catalog: WorkoutCatalog,
    local: LocalSessionStore,
    store: Arc<dyn KeyValueStore>,
    identity: Arc<IdentityProvider>,
  ) -> Self {
    Self {
      catalog,
      local,
      store,
      identity,
      merge: Box::new(KeepLocal),
      sync_lock: Mutex::new(()),
    }
  }

  pub fn with_merge(mut self, merge: Box<dyn RemoteLogMerge>) -> Self {
    self.merge = merge;
    self
  }

  /// True iff a trivial remote read succeeds
  pub async fn check_network_connection(&self) -> bool {
    let probe = TableQuery::new(EXERCISES).select("id").limit(1);
    match self.catalog.gateway().select(&probe).await {
      Ok(_) => true,
      Err(e) => {
        debug!(error = %e, "Connectivity check failed");
        false
      }
    }
  }

  pub async fn perform_full_sync(&self) -> SyncOutcome {
    self.perform_full_sync_at(Utc::now()).await
  }

  pub async fn perform_full_sync_at(&self, now: DateTime<Utc>) -> SyncOutcome {
    let Ok(_guard) = self.sync_lock.try_lock() else {
      info!("Sync requested while another is running");
      return SyncOutcome::failure(MSG_IN_PROGRESS);
    };

    if !self.check_network_connection().await {
      info!("Offline, sync skipped");
      return SyncOutcome::failure(MSG_OFFLINE);
    }

    let user_id = self.identity.get_current_user_id().await;
    info!(user_id = %user_id, "Starting full sync");

    let upload = match self.upload_local_logs(&user_id).await {
      Ok(report) => report,
      Err(e) => {
        warn!(error = %e, "Upload phase failed");
        return SyncOutcome::failure(format!("Upload failed: {}", e));
      }
    };

    let downloaded = match self.download_remote_logs_at(&user_id, now).await {
      Ok(rows) => rows,
      Err(e) => {
        warn!(error = %e, "Download phase failed");
        return SyncOutcome::failure(format!("Download failed: {}", e));
      }
    };

    if let Err(e) = self.merge.merge(&user_id, &downloaded).await {
      warn!(error = %e, "Download merge failed");
      return SyncOutcome::failure(format!("Download failed: {}", e));
    }

    if let Err(e) = self.record_sync_at(now).await {
      warn!(error = %e, "Failed to record last sync time");
    }

    info!(
      uploaded = upload.uploaded,
      duplicates = upload.duplicates,
      skipped = upload.skipped(),
      rejected = upload.rejected,
      downloaded = downloaded.len(),
      "Sync complete"
    );

    SyncOutcome {
      success: true,
      message: format!(
        "Sync complete: {} uploaded, {} downloaded.",
        upload.uploaded,
        downloaded.len()
      ),
      upload: Some(upload),
      downloaded,
    }
  }

  /// -------------------------------------------------------------------------
  /// Upload
  /// -------------------------------------------------------------------------

  /// Push the user's local performance logs, one at a time, newest first
  pub async fn upload_local_logs(&self, user_id: &str) -> Result<UploadReport, SyncError> {
    let logs = self
      .local
      .get_all_performance_logs(user_id, UPLOAD_BATCH_LIMIT)
      .await;

    let mut report = UploadReport::default();
    for log in &logs {
      report.examined += 1;
      self.upload_one(log, &mut report).await?;
    }

    info!(
      examined = report.examined,
      uploaded = report.uploaded,
      skipped = report.skipped(),
      "Upload phase finished"
    );
    Ok(report)
  }

  async fn upload_one(&self, log: &PerformanceLog, report: &mut UploadReport) -> Result<(), SyncError> {
    let window = Duration::seconds(DEDUP_WINDOW_SECONDS);
    if let Some(existing) = self
      .catalog
      .find_log_near(&log.user_id, &log.exercise_id, log.logged_at, window)
      .await?
    {
      debug!(log_id = %log.id, remote_id = %existing, "Already uploaded");
      report.duplicates += 1;
      return Ok(());
    }

    let routine_id = self.resolve_routine_id(log).await?;

    if !self.catalog.exercise_exists(&log.exercise_id).await? {
      warn!(log_id = %log.id, exercise_id = %log.exercise_id, "Unknown exercise, log skipped");
      report.skipped_unknown_exercise += 1;
      return Ok(());
    }

    let Some(routine_id) = routine_id else {
      warn!(log_id = %log.id, "No routine to attach, log skipped");
      report.skipped_missing_routine += 1;
      return Ok(());
    };

    let row = NewWorkoutLogRow {
      user_id: log.user_id.clone(),
      exercise_id: log.exercise_id.clone(),
      routine_id,
      sets_completed: log.sets.unwrap_or(0),
      reps_completed: log
        .reps
        .as_ref()
        .map(|reps| reps.to_string())
        .unwrap_or_else(|| "0".to_string()),
      weight_used: log.weight,
      completed_at: log.logged_at,
    };

    match self.catalog.insert_workout_log(&row).await {
      Ok(inserted) => {
        debug!(log_id = %log.id, remote_id = %inserted.id, "Uploaded log");
        report.uploaded += 1;
      }
      Err(GatewayError::Api { status, message }) => {
        warn!(log_id = %log.id, status, message = %message, "Remote rejected log");
        report.rejected += 1;
      }
      Err(e) => return Err(e.into()),
    }
    Ok(())
  }

  /// The log's own routine, else the user's assigned one, else any routine
  async fn resolve_routine_id(&self, log: &PerformanceLog) -> Result<Option<String>, SyncError> {
    if let Some(routine_id) = log.routine_id.as_ref().filter(|id| !id.trim().is_empty()) {
      return Ok(Some(routine_id.clone()));
    }

    if let Some(assignment) = self.catalog.get_user_routine(&log.user_id).await? {
      return Ok(Some(assignment.routine_id));
    }

    Ok(self.catalog.any_routine_id().await?)
  }

  /// -------------------------------------------------------------------------
  /// Download
  /// -------------------------------------------------------------------------

  pub async fn download_remote_logs(&self, user_id: &str) -> Result<Vec<WorkoutLogRow>, SyncError> {
    self.download_remote_logs_at(user_id, Utc::now()).await
  }

  /// The user's remote logs from the last `DOWNLOAD_WINDOW_DAYS`, newest first
  pub async fn download_remote_logs_at(
    &self,
    user_id: &str,
    now: DateTime<Utc>,
  ) -> Result<Vec<WorkoutLogRow>, SyncError> {
    let since = now - Duration::days(DOWNLOAD_WINDOW_DAYS);
    let rows = self
      .catalog
      .list_workout_logs(user_id, Some(since), DOWNLOAD_LIMIT)
      .await?;
    info!(count = rows.len(), "Downloaded remote logs");
    Ok(rows)
  }

  /// -------------------------------------------------------------------------
  /// Sync Bookkeeping
  /// -------------------------------------------------------------------------

  /// Last successful sync. Missing or unreadable values are `None`.
  pub async fn last_sync_at(&self) -> Option<DateTime<Utc>> {
    let raw = match self.store.get_item(LAST_SYNC_KEY).await {
      Ok(raw) => raw?,
      Err(e) => {
        warn!(error = %e, "Failed to read last sync time");
        return None;
      }
    };

    match serde_json::from_str::<DateTime<Utc>>(&raw) {
      Ok(at) => Some(at),
      Err(e) => {
        warn!(error = %e, "Ignoring corrupted last sync time");
        None
      }
    }
  }

  pub async fn record_sync_at(&self, at: DateTime<Utc>) -> Result<(), StorageError> {
    let raw = serde_json::to_string(&timestamp(at))?;
    self.store.set_item(LAST_SYNC_KEY, &raw).await
  }

  /// Run a full sync when online and the last one is older than
  /// `AUTO_SYNC_INTERVAL_HOURS` (or never happened). `None` when skipped.
  pub async fn setup_auto_sync(&self) -> Option<SyncOutcome> {
    self.setup_auto_sync_at(Utc::now()).await
  }

  pub async fn setup_auto_sync_at(&self, now: DateTime<Utc>) -> Option<SyncOutcome> {
    if !self.check_network_connection().await {
      info!("Offline, auto sync skipped");
      return None;
    }

    let due = match self.last_sync_at().await {
      None => true,
      Some(last) => now - last > Duration::hours(AUTO_SYNC_INTERVAL_HOURS),
    };

    if !due {
      debug!("Synced recently, auto sync skipped");
      return None;
    }

    info!("Running auto sync");
    Some(self.perform_full_sync_at(now).await)
  }

  /// Read-only snapshot for display
  pub async fn get_sync_status(&self) -> SyncStatus {
    let is_online = self.check_network_connection().await;
    let last_sync = self.last_sync_at().await;
    let pending_uploads = match self.identity.stored_user_id().await {
      Some(user_id) => self
        .local
        .get_session_history(&user_id, PENDING_HISTORY_LIMIT)
        .await
        .len(),
      None => 0,
    };

    SyncStatus {
      is_online,
      last_sync,
      pending_uploads,
      sync_in_progress: self.sync_lock.try_lock().is_err(),
    }
  }

  pub async fn clear_sync_data(&self) -> Result<(), StorageError> {
    self
      .store
      .multi_remove(&[SYNC_STATUS_KEY.to_string(), LAST_SYNC_KEY.to_string()])
      .await?;
    info!("Cleared sync bookkeeping");
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
