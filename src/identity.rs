//! Anonymous per-installation user identity
//!
//! The id is resolved from memory, then durable storage, then generated.
//! Storage failures never reach the caller: the app must always have an id.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::storage::KeyValueStore;

pub const USER_ID_KEY: &str = "gym_mate_user_id";

pub struct IdentityProvider {
  store: Arc<dyn KeyValueStore>,
  // Held across the storage round-trip so concurrent callers see one id
  cached: Mutex<Option<String>>,
}

impl IdentityProvider {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      store,
      cached: Mutex::new(None),
    }
  }

  pub async fn get_current_user_id(&self) -> String {
    let mut cached = self.cached.lock().await;

    if let Some(id) = cached.as_ref() {
      return id.clone();
    }

    let id = match self.store.get_item(USER_ID_KEY).await {
      Ok(Some(stored)) if !stored.trim().is_empty() => {
        debug!(user_id = %stored, "Loaded stored user id");
        stored
      }
      Ok(_) => {
        let generated = Uuid::new_v4().to_string();
        match self.store.set_item(USER_ID_KEY, &generated).await {
          Ok(()) => info!(user_id = %generated, "Generated new user id"),
          Err(e) => warn!(error = %e, "Failed to persist user id; using it for this run only"),
        }
        generated
      }
      Err(e) => {
        let generated = Uuid::new_v4().to_string();
        warn!(error = %e, user_id = %generated, "User id storage unreadable; using in-memory id");
        generated
      }
    };

    *cached = Some(id.clone());
    id
  }

  /// Forget the id in memory and in storage. The next lookup generates a new one.
  pub async fn clear_user_id(&self) {
    let mut cached = self.cached.lock().await;
    *cached = None;

    if let Err(e) = self.store.remove_item(USER_ID_KEY).await {
      warn!(error = %e, "Failed to remove stored user id");
    } else {
      info!("User id cleared");
    }
  }

  /// Cached or stored id without generating one. Nothing is written, and an
  /// unreadable store reads as no id.
  pub async fn stored_user_id(&self) -> Option<String> {
    if let Some(id) = self.cached_user_id() {
      return Some(id);
    }

    match self.store.get_item(USER_ID_KEY).await {
      Ok(Some(stored)) if !stored.trim().is_empty() => Some(stored),
      Ok(_) => None,
      Err(e) => {
        warn!(error = %e, "Failed to read stored user id");
        None
      }
    }
  }

  /// Id already resolved in this process, if any. Never touches storage.
  pub fn cached_user_id(&self) -> Option<String> {
    self.cached.try_lock().ok().and_then(|guard| guard.clone())
  }
}
