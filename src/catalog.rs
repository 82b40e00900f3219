//! Typed access to the hosted workout catalog and logs
//!
//! Every method is one or two gateway round-trips. "Not found" is `Ok(None)`;
//! transport and API failures come back as `GatewayError`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::gateway::{GatewayError, RemoteGateway, TableQuery};
use crate::models::{
  CompletionSummary, Difficulty, Exercise, Frequency, Goal, NewWorkoutLogRow, ProfileUpdate,
  Routine, RoutineExercise, TodaysWorkout, UserProfile, UserRoutine, WorkoutLogRow,
};

pub const EXERCISES: &str = "exercises";
pub const ROUTINES: &str = "routines";
pub const ROUTINE_EXERCISES: &str = "routine_exercises";
pub const ALTERNATIVE_EXERCISES: &str = "alternative_exercises";
pub const USER_PROFILES: &str = "user_profiles";
pub const USER_ROUTINES: &str = "user_routines";
pub const WORKOUT_LOGS: &str = "workout_logs";

/// Timestamps in filters use millisecond precision with a `Z` suffix
pub fn timestamp(at: DateTime<Utc>) -> String {
  at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, GatewayError> {
  rows
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(GatewayError::from))
    .collect()
}

fn decode_row<T: DeserializeOwned>(row: Value) -> Result<T, GatewayError> {
  Ok(serde_json::from_value(row)?)
}

fn first<T>(rows: Vec<T>) -> Option<T> {
  rows.into_iter().next()
}

#[derive(Clone)]
pub struct WorkoutCatalog {
  gateway: Arc<dyn RemoteGateway>,
}

impl WorkoutCatalog {
  pub fn new(gateway: Arc<dyn RemoteGateway>) -> Self {
    Self { gateway }
  }

  pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
    &self.gateway
  }

  async fn fetch<T: DeserializeOwned>(&self, query: TableQuery) -> Result<Vec<T>, GatewayError> {
    decode_rows(self.gateway.select(&query).await?)
  }

  /// ---------------------------------------------------------------------------
  /// User Profiles
  /// ---------------------------------------------------------------------------

  pub async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, GatewayError> {
    let rows = self
      .fetch(TableQuery::new(USER_PROFILES).eq("user_id", user_id).limit(1))
      .await?;
    Ok(first(rows))
  }

  /// Create or replace the profile for `profile.user_id`
  pub async fn save_user_profile(&self, profile: &UserProfile) -> Result<UserProfile, GatewayError> {
    let row = self
      .gateway
      .upsert(USER_PROFILES, serde_json::to_value(profile)?, "user_id")
      .await?;
    info!(user_id = %profile.user_id, goal = profile.goal.as_str(), "Saved user profile");
    decode_row(row)
  }

  pub async fn update_user_profile(
    &self,
    user_id: &str,
    changes: &ProfileUpdate,
  ) -> Result<Option<UserProfile>, GatewayError> {
    if changes.is_empty() {
      return self.get_user_profile(user_id).await;
    }

    let rows = self
      .gateway
      .update(
        &TableQuery::new(USER_PROFILES).eq("user_id", user_id),
        serde_json::to_value(changes)?,
      )
      .await?;
    Ok(first(decode_rows(rows)?))
  }

  /// ---------------------------------------------------------------------------
  /// Routines
  /// ---------------------------------------------------------------------------

  pub async fn list_routines(
    &self,
    goal: Option<Goal>,
    frequency: Option<Frequency>,
  ) -> Result<Vec<Routine>, GatewayError> {
    let mut query = TableQuery::new(ROUTINES);
    if let Some(goal) = goal {
      query = query.eq("goal", goal.as_str());
    }
    if let Some(frequency) = frequency {
      query = query.eq("frequency", frequency.as_str());
    }
    self.fetch(query).await
  }

  pub async fn get_routine(&self, routine_id: &str) -> Result<Option<Routine>, GatewayError> {
    let rows = self
      .fetch(TableQuery::new(ROUTINES).eq("id", routine_id).limit(1))
      .await?;
    Ok(first(rows))
  }

  /// The beginner routine matching an onboarding choice
  pub async fn routine_for_preferences(
    &self,
    goal: Goal,
    frequency: Frequency,
  ) -> Result<Option<Routine>, GatewayError> {
    let rows = self
      .fetch(
        TableQuery::new(ROUTINES)
          .eq("goal", goal.as_str())
          .eq("frequency", frequency.as_str())
          .eq("difficulty", Difficulty::Beginner.as_str())
          .limit(1),
      )
      .await?;
    Ok(first(rows))
  }

  /// Any routine at all; the last-resort routine for orphaned logs
  pub async fn any_routine_id(&self) -> Result<Option<String>, GatewayError> {
    let rows = self
      .gateway
      .select(&TableQuery::new(ROUTINES).select("id").limit(1))
      .await?;
    Ok(
      first(rows)
        .and_then(|row| row.get("id").and_then(Value::as_str).map(str::to_string)),
    )
  }

  /// Exercises scheduled for one day of a routine, in display order
  pub async fn routine_exercises(
    &self,
    routine_id: &str,
    day_of_week: u8,
  ) -> Result<Vec<RoutineExercise>, GatewayError> {
    self
      .fetch(
        TableQuery::new(ROUTINE_EXERCISES)
          .eq("routine_id", routine_id)
          .eq("day_of_week", day_of_week)
          .order_by("order_index", true),
      )
      .await
  }

  /// ---------------------------------------------------------------------------
  /// Exercises
  /// ---------------------------------------------------------------------------

  pub async fn get_exercise(&self, exercise_id: &str) -> Result<Option<Exercise>, GatewayError> {
    let rows = self
      .fetch(TableQuery::new(EXERCISES).eq("id", exercise_id).limit(1))
      .await?;
    Ok(first(rows))
  }

  pub async fn exercise_exists(&self, exercise_id: &str) -> Result<bool, GatewayError> {
    let rows = self
      .gateway
      .select(&TableQuery::new(EXERCISES).select("id").eq("id", exercise_id).limit(1))
      .await?;
    Ok(!rows.is_empty())
  }

  pub async fn exercises_by_difficulty(
    &self,
    difficulty: Difficulty,
  ) -> Result<Vec<Exercise>, GatewayError> {
    self
      .fetch(TableQuery::new(EXERCISES).eq("difficulty", difficulty.as_str()))
      .await
  }

  /// Substitutes for an exercise. Dangling alternative links are dropped.
  pub async fn alternative_exercises(&self, exercise_id: &str) -> Result<Vec<Exercise>, GatewayError> {
    let links = self
      .gateway
      .select(
        &TableQuery::new(ALTERNATIVE_EXERCISES)
          .select("alternative_exercise_id")
          .eq("exercise_id", exercise_id),
      )
      .await?;

    let mut alternatives = Vec::new();
    for link in links {
      let Some(alternative_id) = link.get("alternative_exercise_id").and_then(Value::as_str) else {
        continue;
      };
      match self.get_exercise(alternative_id).await? {
        Some(exercise) => alternatives.push(exercise),
        None => debug!(exercise_id, alternative_id, "Alternative exercise missing"),
      }
    }
    Ok(alternatives)
  }

  /// ---------------------------------------------------------------------------
  /// User Routines
  /// ---------------------------------------------------------------------------

  /// A user has at most one assigned routine; assigning replaces it
  pub async fn assign_routine(&self, user_id: &str, routine_id: &str) -> Result<UserRoutine, GatewayError> {
    let row = self
      .gateway
      .upsert(
        USER_ROUTINES,
        serde_json::json!({ "user_id": user_id, "routine_id": routine_id }),
        "user_id",
      )
      .await?;
    info!(user_id, routine_id, "Assigned routine");
    decode_row(row)
  }

  pub async fn get_user_routine(&self, user_id: &str) -> Result<Option<UserRoutine>, GatewayError> {
    let rows = self
      .fetch(TableQuery::new(USER_ROUTINES).eq("user_id", user_id).limit(1))
      .await?;
    Ok(first(rows))
  }

  /// ---------------------------------------------------------------------------
  /// Workout Logs
  /// ---------------------------------------------------------------------------

  pub async fn insert_workout_log(&self, log: &NewWorkoutLogRow) -> Result<WorkoutLogRow, GatewayError> {
    let row = self
      .gateway
      .insert(WORKOUT_LOGS, serde_json::to_value(log)?)
      .await?;
    decode_row(row)
  }

  /// Returns whether a row was removed
  pub async fn delete_workout_log(&self, log_id: &str) -> Result<bool, GatewayError> {
    let removed = self
      .gateway
      .delete(&TableQuery::new(WORKOUT_LOGS).eq("id", log_id))
      .await?;
    Ok(removed > 0)
  }

  /// Newest first
  pub async fn list_workout_logs(
    &self,
    user_id: &str,
    since: Option<DateTime<Utc>>,
    limit: usize,
  ) -> Result<Vec<WorkoutLogRow>, GatewayError> {
    let mut query = TableQuery::new(WORKOUT_LOGS).eq("user_id", user_id);
    if let Some(since) = since {
      query = query.gte("completed_at", timestamp(since));
    }
    self
      .fetch(query.order_by("completed_at", false).limit(limit))
      .await
  }

  /// Id of a log for (user, exercise) completed within `window` of `at`, if any
  pub async fn find_log_near(
    &self,
    user_id: &str,
    exercise_id: &str,
    at: DateTime<Utc>,
    window: Duration,
  ) -> Result<Option<String>, GatewayError> {
    let rows = self
      .gateway
      .select(
        &TableQuery::new(WORKOUT_LOGS)
          .select("id")
          .eq("user_id", user_id)
          .eq("exercise_id", exercise_id)
          .gte("completed_at", timestamp(at - window))
          .lte("completed_at", timestamp(at + window))
          .limit(1),
      )
      .await?;
    Ok(
      first(rows)
        .and_then(|row| row.get("id").and_then(Value::as_str).map(str::to_string)),
    )
  }

  /// ---------------------------------------------------------------------------
  /// Today's Workout
  /// ---------------------------------------------------------------------------

  /// None when the user has no assigned routine (or it no longer exists)
  pub async fn todays_workout(
    &self,
    user_id: &str,
    day_of_week: u8,
  ) -> Result<Option<TodaysWorkout>, GatewayError> {
    let Some(assignment) = self.get_user_routine(user_id).await? else {
      return Ok(None);
    };
    let Some(routine) = self.get_routine(&assignment.routine_id).await? else {
      return Ok(None);
    };

    let exercises = self.routine_exercises(&routine.id, day_of_week).await?;
    Ok(Some(TodaysWorkout { routine, exercises }))
  }

  pub async fn completion_summary(
    &self,
    user_id: &str,
    routine_id: &str,
    day_of_week: u8,
  ) -> Result<CompletionSummary, GatewayError> {
    self
      .completion_summary_at(user_id, routine_id, day_of_week, Utc::now())
      .await
  }

  /// Scheduled exercises for the day vs. those with a remote log since UTC midnight
  pub async fn completion_summary_at(
    &self,
    user_id: &str,
    routine_id: &str,
    day_of_week: u8,
    now: DateTime<Utc>,
  ) -> Result<CompletionSummary, GatewayError> {
    let scheduled = self.routine_exercises(routine_id, day_of_week).await?;
    let midnight = now.date_naive().and_time(chrono::NaiveTime::MIN).and_utc();

    let logged = self
      .gateway
      .select(
        &TableQuery::new(WORKOUT_LOGS)
          .select("exercise_id")
          .eq("user_id", user_id)
          .eq("routine_id", routine_id)
          .gte("completed_at", timestamp(midnight)),
      )
      .await?;
    let logged: HashSet<&str> = logged
      .iter()
      .filter_map(|row| row.get("exercise_id").and_then(Value::as_str))
      .collect();

    let completed = scheduled
      .iter()
      .filter(|exercise| logged.contains(exercise.exercise_id.as_str()))
      .count();

    Ok(CompletionSummary {
      total: scheduled.len(),
      completed,
    })
  }
}
