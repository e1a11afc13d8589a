//! Recompute configuration

use std::env;
use std::time::Duration;

use crate::error::RecomputeError;

pub const TIMEOUT_ENV: &str = "REMATCH_TIMEOUT_MS";
pub const MAX_PARALLEL_ENV: &str = "REMATCH_MAX_PARALLEL";
pub const WORKERS_ENV: &str = "REMATCH_MATCH_WORKERS";

#[derive(Debug, Clone)]
pub struct RecomputeConfig {
    /// Wall-clock budget for one account, from lock wait to commit
    pub timeout: Duration,
    /// Accounts recomputed at once during an import
    pub max_parallel_accounts: usize,
    /// Threads used to match one account's partitions
    pub match_workers: usize,
}

impl Default for RecomputeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_parallel_accounts: 4,
            match_workers: 1,
        }
    }
}

impl RecomputeConfig {
    /// Defaults overridden by whichever variables are set.
    pub fn from_env() -> Result<Self, RecomputeError> {
        let mut config = Self::default();
        if let Some(ms) = read_var(TIMEOUT_ENV)? {
            config.timeout = Duration::from_millis(ms);
        }
        if let Some(n) = read_var(MAX_PARALLEL_ENV)? {
            config.max_parallel_accounts = n as usize;
        }
        if let Some(n) = read_var(WORKERS_ENV)? {
            config.match_workers = n as usize;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RecomputeError> {
        if self.timeout.is_zero() {
            return Err(RecomputeError::InvalidConfig {
                key: TIMEOUT_ENV,
                value: "0".into(),
            });
        }
        if self.max_parallel_accounts == 0 {
            return Err(RecomputeError::InvalidConfig {
                key: MAX_PARALLEL_ENV,
                value: "0".into(),
            });
        }
        if self.match_workers == 0 {
            return Err(RecomputeError::InvalidConfig {
                key: WORKERS_ENV,
                value: "0".into(),
            });
        }
        Ok(())
    }
}

fn read_var(key: &'static str) -> Result<Option<u64>, RecomputeError> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| RecomputeError::InvalidConfig { key, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = RecomputeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_zero_parallelism_rejected() {
        let config = RecomputeConfig {
            max_parallel_accounts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(RecomputeError::InvalidConfig { key: MAX_PARALLEL_ENV, .. })
        ));
    }

    // Single test touching the process environment, so no cross-test races
    #[test]
    fn test_from_env_overrides() {
        env::set_var(TIMEOUT_ENV, "1500");
        env::set_var(MAX_PARALLEL_ENV, "8");
        let config = RecomputeConfig::from_env().unwrap();
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.max_parallel_accounts, 8);

        env::set_var(TIMEOUT_ENV, "soon");
        assert!(RecomputeConfig::from_env().is_err());

        env::remove_var(TIMEOUT_ENV);
        env::remove_var(MAX_PARALLEL_ENV);
    }
}
