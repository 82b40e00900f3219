//! Test utilities and helpers for unit testing
//!
//! This module provides common test infrastructure including:
//! - Database setup/teardown
//! - In-memory fakes for the key-value store and the remote gateway
//! - Mock data factories

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::gateway::{FilterOp, GatewayError, RemoteGateway, TableQuery};
use crate::models::{NewPerformanceLog, Reps, WorkoutSession};
use crate::storage::{KeyValueStore, StorageError};
use crate::AppState;

/// ---------------------------------------------------------------------------
/// Database Test Utilities
/// ---------------------------------------------------------------------------

/// Create an in-memory SQLite database for testing
/// Runs all migrations and returns a ready-to-use pool
///
/// Uses max_connections(1) to prevent multiple pool connections from creating
/// isolated in-memory databases, which would cause intermittent test failures
pub async fn setup_test_db() -> SqlitePool {
  let pool = sqlx::sqlite::SqlitePoolOptions::new()
    .max_connections(1)
    .connect("sqlite::memory:")
    .await
    .expect("Failed to create in-memory database");

  sqlx::migrate!("./migrations")
    .run(&pool)
    .await
    .expect("Failed to run migrations");

  pool
}

/// Close a test database pool
pub async fn teardown_test_db(pool: SqlitePool) {
  pool.close().await;
}

/// ---------------------------------------------------------------------------
/// Key-Value Store Fake
/// ---------------------------------------------------------------------------

/// In-memory store whose reads and writes can be made to fail on demand
#[derive(Default)]
pub struct FailingStore {
  items: Mutex<HashMap<String, String>>,
  fail_reads: AtomicBool,
  fail_writes: AtomicBool,
  refused_keys: Mutex<Vec<String>>,
}

impl FailingStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_reads(&self, fail: bool) {
    self.fail_reads.store(fail, Ordering::SeqCst);
  }

  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  /// Refuse writes to one key while the rest of the store keeps working
  pub fn refuse_writes_to(&self, key: &str) {
    self.refused_keys.lock().unwrap().push(key.to_string());
  }

  pub fn allow_all_writes(&self) {
    self.refused_keys.lock().unwrap().clear();
  }

  fn check_read(&self) -> Result<(), StorageError> {
    if self.fail_reads.load(Ordering::SeqCst) {
      return Err(StorageError::Unavailable("read refused".to_string()));
    }
    Ok(())
  }

  fn check_write(&self) -> Result<(), StorageError> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(StorageError::Unavailable("write refused".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl KeyValueStore for FailingStore {
  async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
    self.check_read()?;
    Ok(self.items.lock().unwrap().get(key).cloned())
  }

  async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
    self.check_write()?;
    if self.refused_keys.lock().unwrap().iter().any(|k| k == key) {
      return Err(StorageError::Unavailable(format!("write to {} refused", key)));
    }
    self.items.lock().unwrap().insert(key.to_string(), value.to_string());
    Ok(())
  }

  async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
    self.check_write()?;
    self.items.lock().unwrap().remove(key);
    Ok(())
  }

  async fn all_keys(&self) -> Result<Vec<String>, StorageError> {
    self.check_read()?;
    let mut keys: Vec<String> = self.items.lock().unwrap().keys().cloned().collect();
    keys.sort();
    Ok(keys)
  }

  async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageError> {
    self.check_write()?;
    let mut items = self.items.lock().unwrap();
    for key in keys {
      items.remove(key);
    }
    Ok(())
  }
}

/// ---------------------------------------------------------------------------
/// Remote Gateway Fake
/// ---------------------------------------------------------------------------

/// Tables of JSON rows with just enough PostgREST filtering for the catalog
#[derive(Default)]
pub struct MemoryGateway {
  tables: Mutex<HashMap<String, Vec<Value>>>,
  offline: AtomicBool,
  reject_inserts: AtomicBool,
  failing_tables: Mutex<Vec<String>>,
  inserts: Mutex<HashMap<String, usize>>,
}

fn text(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn compare(left: &str, right: &str) -> std::cmp::Ordering {
  if let (Ok(a), Ok(b)) = (left.parse::<f64>(), right.parse::<f64>()) {
    return a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
  }
  if let (Ok(a), Ok(b)) = (
    DateTime::parse_from_rfc3339(left),
    DateTime::parse_from_rfc3339(right),
  ) {
    return a.cmp(&b);
  }
  left.cmp(right)
}

fn matches(row: &Value, query: &TableQuery) -> bool {
  query.filters.iter().all(|filter| {
    let Some(cell) = row.get(&filter.column) else {
      return false;
    };
    if cell.is_null() {
      return false;
    }
    let cell = text(cell);
    match filter.op {
      FilterOp::Eq => cell == filter.value,
      FilterOp::Gte => compare(&cell, &filter.value).is_ge(),
      FilterOp::Lte => compare(&cell, &filter.value).is_le(),
    }
  })
}

impl MemoryGateway {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn seed(&self, table: &str, rows: Vec<Value>) {
    self
      .tables
      .lock()
      .unwrap()
      .entry(table.to_string())
      .or_default()
      .extend(rows);
  }

  pub fn rows(&self, table: &str) -> Vec<Value> {
    self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn reject_inserts(&self, reject: bool) {
    self.reject_inserts.store(reject, Ordering::SeqCst);
  }

  /// Every operation on `table` fails with a transport error
  pub fn fail_table(&self, table: &str) {
    self.failing_tables.lock().unwrap().push(table.to_string());
  }

  pub fn insert_count(&self, table: &str) -> usize {
    self.inserts.lock().unwrap().get(table).copied().unwrap_or(0)
  }

  fn check(&self, table: &str) -> Result<(), GatewayError> {
    if self.offline.load(Ordering::SeqCst) {
      return Err(GatewayError::Unavailable("network unreachable".to_string()));
    }
    if self.failing_tables.lock().unwrap().iter().any(|t| t == table) {
      return Err(GatewayError::Request(format!("{} request failed", table)));
    }
    Ok(())
  }

  fn project(row: &Value, columns: &str) -> Value {
    if columns == "*" {
      return row.clone();
    }
    let mut projected = serde_json::Map::new();
    for column in columns.split(',').map(str::trim) {
      if let Some(cell) = row.get(column) {
        projected.insert(column.to_string(), cell.clone());
      }
    }
    Value::Object(projected)
  }

  fn with_id(mut row: Value) -> Value {
    if let Value::Object(map) = &mut row {
      if !map.contains_key("id") {
        map.insert("id".to_string(), json!(Uuid::new_v4().to_string()));
      }
    }
    row
  }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
  async fn select(&self, query: &TableQuery) -> Result<Vec<Value>, GatewayError> {
    self.check(&query.table)?;

    let mut rows: Vec<Value> = self
      .rows(&query.table)
      .into_iter()
      .filter(|row| matches(row, query))
      .collect();

    if let Some((column, ascending)) = &query.order {
      rows.sort_by(|a, b| {
        let a = a.get(column).map(text).unwrap_or_default();
        let b = b.get(column).map(text).unwrap_or_default();
        let ordering = compare(&a, &b);
        if *ascending { ordering } else { ordering.reverse() }
      });
    }
    if let Some(limit) = query.limit {
      rows.truncate(limit);
    }

    Ok(rows.iter().map(|row| Self::project(row, &query.columns)).collect())
  }

  async fn insert(&self, table: &str, row: Value) -> Result<Value, GatewayError> {
    self.check(table)?;
    if self.reject_inserts.load(Ordering::SeqCst) {
      return Err(GatewayError::Api {
        status: 409,
        message: "insert rejected".to_string(),
      });
    }

    let row = Self::with_id(row);
    self.seed(table, vec![row.clone()]);
    *self.inserts.lock().unwrap().entry(table.to_string()).or_default() += 1;
    Ok(row)
  }

  async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value, GatewayError> {
    self.check(table)?;

    let key = row.get(on_conflict).cloned();
    let mut tables = self.tables.lock().unwrap();
    let rows = tables.entry(table.to_string()).or_default();

    if let Some(existing) = rows
      .iter_mut()
      .find(|existing| key.is_some() && existing.get(on_conflict) == key.as_ref())
    {
      if let (Some(target), Value::Object(changes)) = (existing.as_object_mut(), row) {
        target.extend(changes);
      }
      return Ok(existing.clone());
    }

    let row = Self::with_id(row);
    rows.push(row.clone());
    Ok(row)
  }

  async fn update(&self, query: &TableQuery, changes: Value) -> Result<Vec<Value>, GatewayError> {
    self.check(&query.table)?;

    let mut tables = self.tables.lock().unwrap();
    let mut updated = Vec::new();
    if let (Some(rows), Value::Object(changes)) = (tables.get_mut(&query.table), changes) {
      for row in rows.iter_mut().filter(|row| matches(row, query)) {
        if let Some(target) = row.as_object_mut() {
          target.extend(changes.clone());
        }
        updated.push(row.clone());
      }
    }
    Ok(updated)
  }

  async fn delete(&self, query: &TableQuery) -> Result<usize, GatewayError> {
    self.check(&query.table)?;

    let mut tables = self.tables.lock().unwrap();
    let Some(rows) = tables.get_mut(&query.table) else {
      return Ok(0);
    };
    let before = rows.len();
    rows.retain(|row| !matches(row, query));
    Ok(before - rows.len())
  }
}

/// ---------------------------------------------------------------------------
/// Mock Data Factories
/// ---------------------------------------------------------------------------

pub fn date(value: &str) -> NaiveDate {
  NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("Invalid test date")
}

pub fn datetime(value: &str) -> DateTime<Utc> {
  DateTime::parse_from_rfc3339(value)
    .expect("Invalid test datetime")
    .with_timezone(&Utc)
}

/// A fresh session for `workout_date`, started at 08:00 UTC that day
pub fn mock_session(user_id: &str, routine_id: &str, workout_date: NaiveDate) -> WorkoutSession {
  let started_at = workout_date
    .and_hms_opt(8, 0, 0)
    .expect("Invalid test time")
    .and_utc();
  WorkoutSession::new(
    user_id,
    routine_id,
    workout_date,
    workout_date.weekday().number_from_monday() as u8,
    started_at,
  )
}

/// A valid set entry: 3 x 10 at 50kg
pub fn mock_new_log(user_id: &str, exercise_id: &str, routine_id: Option<&str>) -> NewPerformanceLog {
  NewPerformanceLog {
    user_id: user_id.to_string(),
    exercise_id: exercise_id.to_string(),
    routine_id: routine_id.map(str::to_string),
    session_id: None,
    weight: Some(50.0),
    sets: Some(3),
    reps: Some(Reps::from(10)),
    notes: None,
  }
}

/// Three exercises, one beginner routine using e1 and e2 on Tuesday (day 2)
/// and e3 on Thursday (day 4), and e3 as an alternative to e2
pub fn seed_catalog(gateway: &MemoryGateway) {
  gateway.seed(
    "exercises",
    vec![
      json!({"id": "e1", "name": "Goblet Squat", "difficulty": "beginner", "muscle_groups": ["legs"]}),
      json!({"id": "e2", "name": "Push Up", "difficulty": "beginner", "muscle_groups": ["chest"]}),
      json!({"id": "e3", "name": "Incline Push Up", "difficulty": "beginner"}),
    ],
  );
  gateway.seed(
    "routines",
    vec![json!({
      "id": "r1",
      "name": "Beginner Muscle Gain",
      "goal": "Muscle Gain",
      "frequency": "3 days/week",
      "difficulty": "beginner"
    })],
  );
  gateway.seed(
    "routine_exercises",
    vec![
      json!({"id": "re2", "routine_id": "r1", "exercise_id": "e2", "day_of_week": 2, "sets": 3, "reps": "8-12", "rest_time": 60, "order_index": 2}),
      json!({"id": "re1", "routine_id": "r1", "exercise_id": "e1", "day_of_week": 2, "sets": 3, "reps": "10", "rest_time": 90, "order_index": 1}),
      json!({"id": "re3", "routine_id": "r1", "exercise_id": "e1", "day_of_week": 4, "sets": 4, "reps": "8", "rest_time": 90, "order_index": 1}),
    ],
  );
  gateway.seed(
    "alternative_exercises",
    vec![json!({"id": "a1", "exercise_id": "e2", "alternative_exercise_id": "e3"})],
  );
}

/// App state over an in-memory store and a seeded fake gateway
pub fn mock_app_state() -> (Arc<MemoryGateway>, Arc<FailingStore>, AppState) {
  let gateway = Arc::new(MemoryGateway::new());
  seed_catalog(&gateway);
  let store = Arc::new(FailingStore::new());
  let state = AppState::new(store.clone(), gateway.clone());
  (gateway, store, state)
}

/// ---------------------------------------------------------------------------
/// Tests for Test Utilities
/// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_setup_db_creates_schema() {
    let pool = setup_test_db().await;

    let tables: Vec<(String,)> =
      sqlx::query_as("SELECT name FROM sqlite_master WHERE type='table' AND name = 'kv_store'")
        .fetch_all(&pool)
        .await
        .expect("Failed to query tables");

    assert_eq!(tables.len(), 1);

    teardown_test_db(pool).await;
  }

  #[tokio::test]
  async fn test_memory_gateway_filters_orders_and_limits() {
    let gateway = MemoryGateway::new();
    gateway.seed(
      "workout_logs",
      vec![
        json!({"id": "a", "user_id": "u1", "completed_at": "2025-03-04T10:00:00Z"}),
        json!({"id": "b", "user_id": "u1", "completed_at": "2025-03-05T10:00:00Z"}),
        json!({"id": "c", "user_id": "u2", "completed_at": "2025-03-06T10:00:00Z"}),
      ],
    );

    let rows = gateway
      .select(
        &TableQuery::new("workout_logs")
          .select("id")
          .eq("user_id", "u1")
          .gte("completed_at", "2025-03-04T00:00:00.000Z")
          .order_by("completed_at", false)
          .limit(1),
      )
      .await
      .unwrap();

    assert_eq!(rows, vec![json!({"id": "b"})]);
  }

  #[tokio::test]
  async fn test_memory_gateway_upsert_merges_on_conflict_column() {
    let gateway = MemoryGateway::new();
    gateway
      .upsert("user_routines", json!({"user_id": "u1", "routine_id": "r1"}), "user_id")
      .await
      .unwrap();
    gateway
      .upsert("user_routines", json!({"user_id": "u1", "routine_id": "r2"}), "user_id")
      .await
      .unwrap();

    let rows = gateway.rows("user_routines");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["routine_id"], "r2");
  }

  #[tokio::test]
  async fn test_failing_store_works_until_told_to_fail() {
    let store = FailingStore::new();
    store.set_item("k", "v").await.unwrap();
    assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));

    store.fail_reads(true);
    assert!(store.get_item("k").await.is_err());
  }

  #[test]
  fn test_mock_session_uses_weekday_of_date() {
    // 2025-03-04 is a Tuesday
    let session = mock_session("u1", "r1", date("2025-03-04"));
    assert_eq!(session.day_of_week, 2);
    assert_eq!(session.id, "session_u1_2025-03-04");
  }
}
