//! Durable key-value storage
//!
//! All local workout state is kept as JSON strings under well-known keys.
//! The trait mirrors the small surface the rest of the crate needs; the
//! SQLite implementation is what ships.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;

use crate::db::DbPool;

/// ---------------------------------------------------------------------------
/// Error Handling
/// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
  #[error("Database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("Failed to encode value: {0}")]
  Encode(#[from] serde_json::Error),

  #[error("Storage unavailable: {0}")]
  Unavailable(String),
}

impl Serialize for StorageError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Key-Value Store
/// ---------------------------------------------------------------------------

#[async_trait]
pub trait KeyValueStore: Send + Sync {
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

  async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

  async fn all_keys(&self) -> Result<Vec<String>, StorageError>;

  /// Removes every listed key in one write. Missing keys are ignored.
  async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError>;
}

/// SQLite-backed store, one row per key
#[derive(Clone)]
pub struct SqliteKeyValueStore {
  pool: DbPool,
}

impl SqliteKeyValueStore {
  pub fn new(pool: DbPool) -> Self {
    Self { pool }
  }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?1")
      .bind(key)
      .fetch_optional(&self.pool)
      .await?;

    Ok(value)
  }

  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    sqlx::query(
      r#"
      INSERT INTO kv_store (key, value, updated_at)
      VALUES (?1, ?2, ?3)
      ON CONFLICT(key) DO UPDATE SET
        value = excluded.value,
        updated_at = excluded.updated_at
      "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(&self.pool)
    .await?;

    Ok(())
  }

  async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    sqlx::query("DELETE FROM kv_store WHERE key = ?1")
      .bind(key)
      .execute(&self.pool)
      .await?;

    Ok(())
  }

  async fn all_keys(&self) -> Result<Vec<String>, StorageError> {
    let keys: Vec<String> = sqlx::query_scalar("SELECT key FROM kv_store ORDER BY key")
      .fetch_all(&self.pool)
      .await?;

    Ok(keys)
  }

  async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
    let mut tx = self.pool.begin().await?;
    for key in keys {
      sqlx::query("DELETE FROM kv_store WHERE key = ?1")
        .bind(key)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Tests
/// ---------------------------------------------------------------------------
