use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Reps are entered either as a number (`10`, `7.5`) or as free text
/// ("8-12", "to failure")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reps {
  Count(Number),
  Text(String),
}

impl From<i64> for Reps {
  fn from(count: i64) -> Self {
    Reps::Count(count.into())
  }
}

impl Reps {
  fn validate(&self) -> Result<(), ValidationError> {
    match self {
      Reps::Count(n) => match n.as_f64() {
        Some(value) if value >= 0.0 => Ok(()),
        _ => Err(ValidationError::InvalidReps(n.to_string())),
      },
      Reps::Text(text) => {
        let trimmed = text.trim();
        if trimmed.is_empty() {
          return Err(ValidationError::InvalidReps(text.clone()));
        }
        match trimmed.parse::<f64>() {
          Ok(n) if n < 0.0 || !n.is_finite() => Err(ValidationError::InvalidReps(text.clone())),
          _ => Ok(()),
        }
      }
    }
  }
}

impl std::fmt::Display for Reps {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Reps::Count(n) => write!(f, "{}", n),
      Reps::Text(text) => write!(f, "{}", text),
    }
  }
}

/// ---------------------------------------------------------------------------
/// Validation
/// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
  #[error("User id is required")]
  MissingUserId,

  #[error("Exercise id is required")]
  MissingExerciseId,

  #[error("Weight must be greater than 0 (got {0})")]
  NonPositiveWeight(f64),

  #[error("Sets must be greater than 0 (got {0})")]
  NonPositiveSets(i32),

  #[error("Reps must be a non-negative number or a description (got {0:?})")]
  InvalidReps(String),
}

impl Serialize for ValidationError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

/// ---------------------------------------------------------------------------
/// Performance Logs
/// ---------------------------------------------------------------------------

/// A set as entered by the user, before it is stamped and stored
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPerformanceLog {
  pub user_id: String,
  pub exercise_id: String,
  pub routine_id: Option<String>,
  pub session_id: Option<String>,
  pub weight: Option<f64>,
  pub sets: Option<i32>,
  pub reps: Option<Reps>,
  pub notes: Option<String>,
}

impl NewPerformanceLog {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.user_id.trim().is_empty() {
      return Err(ValidationError::MissingUserId);
    }
    if self.exercise_id.trim().is_empty() {
      return Err(ValidationError::MissingExerciseId);
    }
    if let Some(weight) = self.weight {
      // NaN fails this comparison too
      if !(weight > 0.0) || !weight.is_finite() {
        return Err(ValidationError::NonPositiveWeight(weight));
      }
    }
    if let Some(sets) = self.sets {
      if sets <= 0 {
        return Err(ValidationError::NonPositiveSets(sets));
      }
    }
    if let Some(reps) = &self.reps {
      reps.validate()?;
    }
    Ok(())
  }

  /// Validate and stamp. Nothing is built for an invalid entry.
  pub fn into_log(self, id: String, logged_at: DateTime<Utc>) -> Result<PerformanceLog, ValidationError> {
    self.validate()?;
    Ok(PerformanceLog {
      id,
      user_id: self.user_id,
      exercise_id: self.exercise_id,
      routine_id: self.routine_id,
      session_id: self.session_id,
      weight: self.weight,
      sets: self.sets,
      reps: self.reps,
      notes: self.notes,
      logged_at,
    })
  }
}

/// A recorded set, as kept in `workout_performance_logs`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceLog {
  pub id: String,
  pub user_id: String,
  pub exercise_id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub routine_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub session_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub weight: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sets: Option<i32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub reps: Option<Reps>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  pub logged_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
  use super::*;

  fn valid_log() -> NewPerformanceLog {
    NewPerformanceLog {
      user_id: "u1".to_string(),
      exercise_id: "e1".to_string(),
      weight: Some(60.0),
      sets: Some(3),
      reps: Some(Reps::Text("12".to_string())),
      ..Default::default()
    }
  }

  #[test]
  fn test_valid_log_passes() {
    assert_eq!(valid_log().validate(), Ok(()));

    let bare = NewPerformanceLog {
      user_id: "u1".to_string(),
      exercise_id: "e1".to_string(),
      ..Default::default()
    };
    assert_eq!(bare.validate(), Ok(()));
  }

  #[test]
  fn test_each_invalid_field_is_rejected_independently() {
    let cases: Vec<(NewPerformanceLog, ValidationError)> = vec![
      (
        NewPerformanceLog { weight: Some(-1.0), ..valid_log() },
        ValidationError::NonPositiveWeight(-1.0),
      ),
      (
        NewPerformanceLog { sets: Some(0), ..valid_log() },
        ValidationError::NonPositiveSets(0),
      ),
      (
        NewPerformanceLog { reps: Some(Reps::from(-5)), ..valid_log() },
        ValidationError::InvalidReps("-5".to_string()),
      ),
      (
        NewPerformanceLog { user_id: String::new(), ..valid_log() },
        ValidationError::MissingUserId,
      ),
      (
        NewPerformanceLog { exercise_id: "  ".to_string(), ..valid_log() },
        ValidationError::MissingExerciseId,
      ),
    ];

    for (log, expected) in cases {
      assert_eq!(log.validate(), Err(expected));
    }
  }

  #[test]
  fn test_reps_text_rules() {
    let with_reps = |reps: &str| NewPerformanceLog {
      reps: Some(Reps::Text(reps.to_string())),
      ..valid_log()
    };

    assert!(with_reps("8-12").validate().is_ok());
    assert!(with_reps("0").validate().is_ok());
    assert!(with_reps("-5").validate().is_err());
    assert!(with_reps("   ").validate().is_err());
  }

  #[test]
  fn test_zero_weight_and_nan_rejected() {
    assert!(NewPerformanceLog { weight: Some(0.0), ..valid_log() }.validate().is_err());
    assert!(NewPerformanceLog { weight: Some(f64::NAN), ..valid_log() }.validate().is_err());
  }

  #[test]
  fn test_reps_accepts_number_or_string_json() {
    let numeric: PerformanceLog = serde_json::from_str(
      r#"{"id":"p1","userId":"u1","exerciseId":"e1","reps":12,"loggedAt":"2025-03-04T10:00:00.000Z"}"#,
    )
    .unwrap();
    assert_eq!(numeric.reps, Some(Reps::from(12)));

    let fractional: PerformanceLog = serde_json::from_str(
      r#"{"id":"p1","userId":"u1","exerciseId":"e1","reps":7.5,"loggedAt":"2025-03-04T10:00:00.000Z"}"#,
    )
    .unwrap();
    let reps = fractional.reps.unwrap();
    assert_eq!(reps.to_string(), "7.5");
    assert!(NewPerformanceLog { reps: Some(reps), ..valid_log() }.validate().is_ok());

    let text: PerformanceLog = serde_json::from_str(
      r#"{"id":"p1","userId":"u1","exerciseId":"e1","reps":"8-12","loggedAt":"2025-03-04T10:00:00.000Z"}"#,
    )
    .unwrap();
    assert_eq!(text.reps, Some(Reps::Text("8-12".to_string())));
    assert_eq!(text.routine_id, None);
  }

  #[test]
  fn test_into_log_rejects_before_building() {
    let result = NewPerformanceLog { sets: Some(-2), ..valid_log() }.into_log("p1".into(), Utc::now());
    assert_eq!(result, Err(ValidationError::NonPositiveSets(-2)));
  }
}
