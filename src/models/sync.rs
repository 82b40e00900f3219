use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::remote::WorkoutLogRow;

/// Snapshot of the synchronizer, for display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
  pub is_online: bool,
  pub last_sync: Option<DateTime<Utc>>,
  /// Session history entries not yet confirmed remote (an estimate)
  pub pending_uploads: usize,
  pub sync_in_progress: bool,
}

/// Per-item results of the upload phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
  pub examined: usize,
  pub uploaded: usize,
  /// Already present remotely within the de-duplication window
  pub duplicates: usize,
  pub skipped_unknown_exercise: usize,
  pub skipped_missing_routine: usize,
  /// Insert refused by the remote API
  pub rejected: usize,
}

impl UploadReport {
  pub fn skipped(&self) -> usize {
    self.skipped_unknown_exercise + self.skipped_missing_routine
  }
}

/// Result of a full sync. Failures are reported here, never thrown.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
  pub success: bool,
  pub message: String,
  pub upload: Option<UploadReport>,
  pub downloaded: Vec<WorkoutLogRow>,
}

impl SyncOutcome {
  pub fn failure(message: impl Into<String>) -> Self {
    Self {
      success: false,
      message: message.into(),
      upload: None,
      downloaded: Vec::new(),
    }
  }
}
