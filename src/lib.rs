pub mod catalog;
pub mod commands;
pub mod config;
pub mod db;
pub mod gateway;
pub mod identity;
pub mod local_store;
pub mod logging;
pub mod models;
pub mod session_engine;
pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_utils;

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use catalog::WorkoutCatalog;
use config::{AppConfig, ConfigError};
use db::DbError;
use gateway::{GatewayError, RemoteGateway, SupabaseGateway};
use identity::IdentityProvider;
use local_store::LocalSessionStore;
use session_engine::SessionEngine;
use storage::{KeyValueStore, SqliteKeyValueStore};
use sync::SyncService;

#[derive(Debug, thiserror::Error)]
pub enum InitError {
  #[error("Configuration error: {0}")]
  Config(#[from] ConfigError),

  #[error("Database error: {0}")]
  Database(#[from] DbError),

  #[error("Gateway error: {0}")]
  Gateway(#[from] GatewayError),
}

impl Serialize for InitError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// Everything the commands need, built once per process
pub struct AppState {
  pub identity: Arc<IdentityProvider>,
  pub sessions: SessionEngine,
  pub catalog: WorkoutCatalog,
  pub sync: SyncService,
}

impl AppState {
  pub fn new(store: Arc<dyn KeyValueStore>, gateway: Arc<dyn RemoteGateway>) -> Self {
    let identity = Arc::new(IdentityProvider::new(store.clone()));
    let local = LocalSessionStore::new(store.clone());
    let catalog = WorkoutCatalog::new(gateway);

    Self {
      sync: SyncService::new(catalog.clone(), local.clone(), store, identity.clone()),
      sessions: SessionEngine::new(local),
      catalog,
      identity,
    }
  }
}

/// Load `.env`, start logging, open the local database and connect the remote gateway
pub async fn bootstrap() -> Result<AppState, InitError> {
  dotenvy::dotenv().ok();
  logging::init_logging();

  let config = AppConfig::from_env()?;
  let pool = db::initialize_db(&config.db_path).await?;
  let gateway = SupabaseGateway::from_config(&config)?;

  info!(host = config.supabase_url.host_str().unwrap_or_default(), "Gym Mate core ready");
  Ok(AppState::new(
    Arc::new(SqliteKeyValueStore::new(pool)),
    Arc::new(gateway),
  ))
}
