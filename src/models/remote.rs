//! Rows of the hosted database tables
//!
//! Column names follow the remote schema (snake_case). Unknown columns such as
//! `created_at` are ignored on read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Goal {
  #[serde(rename = "Muscle Gain")]
  MuscleGain,
  #[serde(rename = "Fat Loss")]
  FatLoss,
  #[serde(rename = "General Fitness")]
  GeneralFitness,
}

impl Goal {
  pub fn as_str(&self) -> &'static str {
    match self {
      Goal::MuscleGain => "Muscle Gain",
      Goal::FatLoss => "Fat Loss",
      Goal::GeneralFitness => "General Fitness",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
  #[serde(rename = "2 days/week")]
  TwoDays,
  #[serde(rename = "3 days/week")]
  ThreeDays,
  #[serde(rename = "4 days/week")]
  FourDays,
}

impl Frequency {
  pub fn as_str(&self) -> &'static str {
    match self {
      Frequency::TwoDays => "2 days/week",
      Frequency::ThreeDays => "3 days/week",
      Frequency::FourDays => "4 days/week",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Beginner,
  Intermediate,
  Advanced,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Beginner => "beginner",
      Difficulty::Intermediate => "intermediate",
      Difficulty::Advanced => "advanced",
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub video_url: Option<String>,
  #[serde(default)]
  pub tips: Vec<String>,
  #[serde(default)]
  pub muscle_groups: Vec<String>,
  #[serde(default)]
  pub equipment: Option<String>,
  pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
  pub id: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub goal: Goal,
  pub frequency: Frequency,
  pub difficulty: Difficulty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineExercise {
  pub id: String,
  pub routine_id: String,
  pub exercise_id: String,
  pub day_of_week: u8,
  pub sets: i32,
  pub reps: String,
  /// Seconds
  pub rest_time: i32,
  pub order_index: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlternativeExercise {
  pub id: String,
  pub exercise_id: String,
  pub alternative_exercise_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoutine {
  #[serde(default)]
  pub id: Option<String>,
  pub user_id: String,
  pub routine_id: String,
  #[serde(default)]
  pub assigned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub user_id: String,
  pub goal: Goal,
  pub frequency: Frequency,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub assigned_routine_id: Option<String>,
}

/// Partial profile change; unset fields are left as stored
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub goal: Option<Goal>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub frequency: Option<Frequency>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub assigned_routine_id: Option<String>,
}

impl ProfileUpdate {
  pub fn is_empty(&self) -> bool {
    self.goal.is_none() && self.frequency.is_none() && self.assigned_routine_id.is_none()
  }
}

/// A durable workout log row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutLogRow {
  pub id: String,
  pub user_id: String,
  pub exercise_id: String,
  pub routine_id: String,
  pub sets_completed: i32,
  #[serde(default)]
  pub reps_completed: Option<String>,
  #[serde(default)]
  pub weight_used: Option<f64>,
  pub completed_at: DateTime<Utc>,
}

/// For inserting new workout logs (the remote assigns the id)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWorkoutLogRow {
  pub user_id: String,
  pub exercise_id: String,
  pub routine_id: String,
  pub sets_completed: i32,
  pub reps_completed: String,
  pub weight_used: Option<f64>,
  pub completed_at: DateTime<Utc>,
}

/// Today's plan for a user: the assigned routine and that day's exercises
#[derive(Debug, Clone, Serialize)]
pub struct TodaysWorkout {
  pub routine: Routine,
  pub exercises: Vec<RoutineExercise>,
}

/// How much of a day's routine has remote logs since midnight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompletionSummary {
  pub total: usize,
  pub completed: usize,
}

impl CompletionSummary {
  pub fn is_complete(&self) -> bool {
    self.total > 0 && self.completed == self.total
  }
}
