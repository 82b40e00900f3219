use crate::models::{SyncOutcome, SyncStatus};
use crate::AppState;

/// Manual sync. Failures are inside the outcome, so this never errors.
pub async fn sync_now(state: &AppState) -> Result<SyncOutcome, String> {
  Ok(state.sync.perform_full_sync().await)
}

/// App-start sync; `None` when skipped (offline or synced recently)
pub async fn run_auto_sync(state: &AppState) -> Result<Option<SyncOutcome>, String> {
  Ok(state.sync.setup_auto_sync().await)
}

pub async fn get_sync_status(state: &AppState) -> Result<SyncStatus, String> {
  Ok(state.sync.get_sync_status().await)
}
