use std::env;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, WorkflowError};

pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
pub const DEFAULT_WORKERS: usize = 50;

pub const QUEUE_CAPACITY_ENV: &str = "TASKFLOW_QUEUE_CAPACITY";
pub const WORKERS_ENV: &str = "TASKFLOW_WORKERS";

/// Sizing of an [`ExecutorService`](crate::ExecutorService).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            workers: DEFAULT_WORKERS,
        }
    }
}

impl ExecutorConfig {
    pub fn new(queue_capacity: usize, workers: usize) -> Self {
        Self {
            queue_capacity,
            workers,
        }
    }

    /// Defaults overridden by `TASKFLOW_QUEUE_CAPACITY` / `TASKFLOW_WORKERS`.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(capacity) = read_env_usize(QUEUE_CAPACITY_ENV)? {
            config.queue_capacity = capacity;
        }
        if let Some(workers) = read_env_usize(WORKERS_ENV)? {
            config.workers = workers;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(WorkflowError::Config(
                "executor needs at least one worker".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env_usize(key: &str) -> Result<Option<usize>> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .map_err(|_| WorkflowError::Config(format!("`{}` is not a valid count: {}", key, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.queue_capacity, 100);
        assert_eq!(config.workers, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ExecutorConfig::from_json_str(r#"{ "workers": 4 }"#).unwrap();
        assert_eq!(config, ExecutorConfig::new(DEFAULT_QUEUE_CAPACITY, 4));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = ExecutorConfig::from_json_str(r#"{ "workers": 0 }"#).unwrap_err();
        assert!(matches!(err, WorkflowError::Config(_)));
    }

    #[test]
    fn test_from_env() {
        env::set_var(QUEUE_CAPACITY_ENV, "7");
        env::set_var(WORKERS_ENV, "3");
        let config = ExecutorConfig::from_env().unwrap();
        assert_eq!(config, ExecutorConfig::new(7, 3));

        env::set_var(WORKERS_ENV, "many");
        assert!(ExecutorConfig::from_env().is_err());

        env::remove_var(QUEUE_CAPACITY_ENV);
        env::remove_var(WORKERS_ENV);
    }
}
