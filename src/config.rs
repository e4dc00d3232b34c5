use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::errors::AppError;

pub const DEFAULT_PERMISSION_DIR: &str = "conf/permissions";
pub const DEFAULT_SUPPORT_USER_ID: &str = "2";
pub const DEFAULT_SERVICE_ACCOUNT_MIN: u64 = 1000;
pub const DEFAULT_SERVICE_ACCOUNT_MAX: u64 = 5000;
pub const DEFAULT_SIBLING_FANOUT_LIMIT: usize = 16;
pub const DEFAULT_SIBLING_TIMEOUT_MS: u64 = 5000;

/// Runtime settings for the authorization engine.
#[derive(Debug, Clone)]
pub struct AuthzConfig {
    /// Root of the static permission tree.
    pub permission_dir: PathBuf,
    pub support_user_id: String,
    /// Exclusive bounds of the internal service account band.
    pub service_account_min: u64,
    pub service_account_max: u64,
    /// Upper bound on concurrent sibling lookups during app aggregation.
    pub sibling_fanout_limit: usize,
    pub sibling_timeout: Duration,
}

impl Default for AuthzConfig {
    fn default() -> Self {
        Self {
            permission_dir: PathBuf::from(DEFAULT_PERMISSION_DIR),
            support_user_id: DEFAULT_SUPPORT_USER_ID.to_string(),
            service_account_min: DEFAULT_SERVICE_ACCOUNT_MIN,
            service_account_max: DEFAULT_SERVICE_ACCOUNT_MAX,
            sibling_fanout_limit: DEFAULT_SIBLING_FANOUT_LIMIT,
            sibling_timeout: Duration::from_millis(DEFAULT_SIBLING_TIMEOUT_MS),
        }
    }
}

impl AuthzConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();

        let permission_dir = std::env::var("PERMISSION_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.permission_dir);
        let support_user_id =
            std::env::var("SUPPORT_USER_ID").unwrap_or(defaults.support_user_id);
        let service_account_min = env_parse("SERVICE_ACCOUNT_MIN", defaults.service_account_min)?;
        let service_account_max = env_parse("SERVICE_ACCOUNT_MAX", defaults.service_account_max)?;
        let sibling_fanout_limit = env_parse("SIBLING_FANOUT_LIMIT", defaults.sibling_fanout_limit)?;
        let sibling_timeout_ms = env_parse("SIBLING_TIMEOUT_MS", DEFAULT_SIBLING_TIMEOUT_MS)?;

        let config = Self {
            permission_dir,
            support_user_id,
            service_account_min,
            service_account_max,
            sibling_fanout_limit,
            sibling_timeout: Duration::from_millis(sibling_timeout_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_permission_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.permission_dir = dir.into();
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.service_account_min >= self.service_account_max {
            return Err(AppError::configuration(
                "SERVICE_ACCOUNT_MIN must be lower than SERVICE_ACCOUNT_MAX",
            ));
        }
        if self.sibling_fanout_limit == 0 {
            return Err(AppError::configuration("SIBLING_FANOUT_LIMIT must be at least 1"));
        }
        if self.support_user_id.trim().is_empty() {
            return Err(AppError::configuration("SUPPORT_USER_ID must not be empty"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match std::env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid number"))),
        Err(_) => Ok(default),
    }
}
