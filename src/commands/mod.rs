//! UI-facing operations
//!
//! Each command resolves the current user through the identity provider and
//! reports failures as display strings for the UI bridge.

pub mod sync;
pub mod workout;

pub use sync::{get_sync_status, run_auto_sync, sync_now};
pub use workout::{
  get_recent_logs, get_session_history, get_today_session, log_set, reset_local_data,
  toggle_exercise,
};
