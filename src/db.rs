use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub type DbPool = SqlitePool;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
  #[error("Failed to create data directory {path}: {source}")]
  Directory {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Database error: {0}")]
  Sqlx(#[from] sqlx::Error),

  #[error("Migration failed: {0}")]
  Migration(#[from] sqlx::migrate::MigrateError),
}

/// Default location of the database file
/// Stored in: <platform data dir>/gym-mate/gym-mate.db
pub fn default_db_path() -> PathBuf {
  match dirs::data_dir() {
    Some(dir) => dir.join("gym-mate").join("gym-mate.db"),
    None => PathBuf::from("gym-mate.db"),
  }
}

/// Open the database connection pool and run migrations
pub async fn initialize_db(db_path: &Path) -> Result<DbPool, DbError> {
  if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|source| DbError::Directory {
      path: parent.to_path_buf(),
      source,
    })?;
  }

  let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
  info!(path = %db_path.display(), "Initializing database");

  let pool = SqlitePoolOptions::new()
    .max_connections(5)
    .connect(&db_url)
    .await?;

  sqlx::migrate!("./migrations").run(&pool).await?;

  info!("Database initialized successfully");
  Ok(pool)
}
