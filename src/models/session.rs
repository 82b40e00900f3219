use chrono::{DateTime, NaiveDate, Utc};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Where a day's session is in its lifecycle. Transitions only move forward:
/// NotStarted -> InProgress -> Completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
  /// No record exists yet for that day
  NotStarted,
  InProgress,
  Completed,
}

impl std::fmt::Display for SessionStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::NotStarted => write!(f, "not_started"),
      Self::InProgress => write!(f, "in_progress"),
      Self::Completed => write!(f, "completed"),
    }
  }
}

/// Exercises checked off in a session. Insertion-ordered, each id at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedExercises(IndexSet<String>);

impl CompletedExercises {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn contains(&self, exercise_id: &str) -> bool {
    self.0.contains(exercise_id)
  }

  /// Symmetric-difference update. Returns true if the exercise is now completed.
  pub fn toggle(&mut self, exercise_id: &str) -> bool {
    if self.0.shift_remove(exercise_id) {
      false
    } else {
      self.0.insert(exercise_id.to_string());
      true
    }
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(String::as_str)
  }

  /// Flatten to the plain sequence written to storage
  pub fn to_vec(&self) -> Vec<String> {
    self.0.iter().cloned().collect()
  }
}

impl FromIterator<String> for CompletedExercises {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// One user's progress through one calendar day's workout
#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutSession {
  pub id: String,
  pub user_id: String,
  pub routine_id: String,
  pub workout_date: NaiveDate,
  /// 1 = Monday .. 7 = Sunday
  pub day_of_week: u8,
  pub is_completed: bool,
  pub started_at: DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
  pub completed_exercises: CompletedExercises,
}

impl WorkoutSession {
  pub fn new(
    user_id: &str,
    routine_id: &str,
    workout_date: NaiveDate,
    day_of_week: u8,
    started_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: session_id(user_id, workout_date),
      user_id: user_id.to_string(),
      routine_id: routine_id.to_string(),
      workout_date,
      day_of_week,
      is_completed: false,
      started_at,
      completed_at: None,
      completed_exercises: CompletedExercises::new(),
    }
  }

  pub fn status(&self) -> SessionStatus {
    if self.is_completed && self.completed_at.is_some() {
      SessionStatus::Completed
    } else {
      SessionStatus::InProgress
    }
  }

  pub fn completed_count(&self) -> usize {
    self.completed_exercises.len()
  }

  pub fn all_done(&self, total_exercise_count: usize) -> bool {
    self.completed_exercises.len() == total_exercise_count
  }
}

/// Session ids are derived from (user, date), so every caller on the same day
/// converges on the same id.
pub fn session_id(user_id: &str, workout_date: NaiveDate) -> String {
  format!("session_{}_{}", user_id, workout_date.format("%Y-%m-%d"))
}

/// ---------------------------------------------------------------------------
/// Storage Representation
/// ---------------------------------------------------------------------------

/// Shape written under `workout_current_session_*` and into the history array.
/// The completed set is flattened to an array here and nowhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSession {
  pub id: String,
  pub user_id: String,
  pub routine_id: String,
  pub workout_date: NaiveDate,
  pub day_of_week: u8,
  pub is_completed: bool,
  pub started_at: DateTime<Utc>,
  #[serde(default)]
  pub completed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub completed_exercises: Vec<String>,
}

impl From<&WorkoutSession> for StoredSession {
  fn from(session: &WorkoutSession) -> Self {
    Self {
      id: session.id.clone(),
      user_id: session.user_id.clone(),
      routine_id: session.routine_id.clone(),
      workout_date: session.workout_date,
      day_of_week: session.day_of_week,
      is_completed: session.is_completed,
      started_at: session.started_at,
      completed_at: session.completed_at,
      completed_exercises: session.completed_exercises.to_vec(),
    }
  }
}

impl From<StoredSession> for WorkoutSession {
  fn from(stored: StoredSession) -> Self {
    Self {
      id: stored.id,
      user_id: stored.user_id,
      routine_id: stored.routine_id,
      workout_date: stored.workout_date,
      day_of_week: stored.day_of_week,
      is_completed: stored.is_completed,
      started_at: stored.started_at,
      completed_at: stored.completed_at,
      completed_exercises: stored.completed_exercises.into_iter().collect(),
    }
  }
}

impl Serialize for WorkoutSession {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    StoredSession::from(self).serialize(serializer)
  }
}
