use std::env;
use std::path::PathBuf;

use serde::Serialize;
use url::Url;

use crate::db::default_db_path;

pub const SUPABASE_URL_VAR: &str = "SUPABASE_URL";
pub const SUPABASE_ANON_KEY_VAR: &str = "SUPABASE_ANON_KEY";
pub const DB_PATH_VAR: &str = "GYM_MATE_DB_PATH";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  #[error("Missing configuration: {0}")]
  MissingConfig(String),

  #[error("Invalid URL in {name}: {reason}")]
  InvalidUrl { name: String, reason: String },
}

impl Serialize for ConfigError {
  fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
  where
    S: serde::Serializer,
  {
    serializer.serialize_str(&self.to_string())
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub supabase_url: Url,
  pub supabase_anon_key: String,
  pub db_path: PathBuf,
}

fn required(name: &str) -> Result<String, ConfigError> {
  env::var(name)
    .ok()
    .filter(|value| !value.trim().is_empty())
    .ok_or_else(|| ConfigError::MissingConfig(name.into()))
}

impl AppConfig {
  /// Read from the process environment. Call `dotenvy::dotenv()` first to pick up `.env`.
  pub fn from_env() -> Result<Self, ConfigError> {
    let raw_url = required(SUPABASE_URL_VAR)?;
    let supabase_url = Url::parse(&raw_url).map_err(|e| ConfigError::InvalidUrl {
      name: SUPABASE_URL_VAR.into(),
      reason: e.to_string(),
    })?;

    let db_path = env::var(DB_PATH_VAR)
      .ok()
      .filter(|value| !value.trim().is_empty())
      .map(PathBuf::from)
      .unwrap_or_else(default_db_path);

    Ok(Self {
      supabase_url,
      supabase_anon_key: required(SUPABASE_ANON_KEY_VAR)?,
      db_path,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  #[test]
  #[serial]
  fn test_from_env_reads_all_values() {
    temp_env::with_vars(
      [
        (SUPABASE_URL_VAR, Some("https://project.supabase.co")),
        (SUPABASE_ANON_KEY_VAR, Some("anon-key")),
        (DB_PATH_VAR, Some("/tmp/gym-mate-test.db")),
      ],
      || {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.supabase_url.host_str(), Some("project.supabase.co"));
        assert_eq!(config.supabase_anon_key, "anon-key");
        assert_eq!(config.db_path, PathBuf::from("/tmp/gym-mate-test.db"));
      },
    );
  }

  #[test]
  #[serial]
  fn test_db_path_defaults_when_unset() {
    temp_env::with_vars(
      [
        (SUPABASE_URL_VAR, Some("https://project.supabase.co")),
        (SUPABASE_ANON_KEY_VAR, Some("anon-key")),
        (DB_PATH_VAR, None),
      ],
      || {
        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.db_path, default_db_path());
      },
    );
  }

  #[test]
  #[serial]
  fn test_missing_key_is_reported_by_name() {
    temp_env::with_vars(
      [
        (SUPABASE_URL_VAR, Some("https://project.supabase.co")),
        (SUPABASE_ANON_KEY_VAR, None),
      ],
      || match AppConfig::from_env() {
        Err(ConfigError::MissingConfig(name)) => assert_eq!(name, SUPABASE_ANON_KEY_VAR),
        other => panic!("expected missing config, got {:?}", other),
      },
    );
  }

  #[test]
  #[serial]
  fn test_invalid_url_rejected() {
    temp_env::with_vars(
      [
        (SUPABASE_URL_VAR, Some("not a url")),
        (SUPABASE_ANON_KEY_VAR, Some("anon-key")),
      ],
      || {
        assert!(matches!(
          AppConfig::from_env(),
          Err(ConfigError::InvalidUrl { .. })
        ));
      },
    );
  }
}
