use std::env;

use crate::error::{BenchError, Result};

/// Environment variable overriding the matrix side length.
pub const SIZE_ENV: &str = "MATBENCH_SIZE";
/// Environment variable overriding the number of warm-up executions.
pub const WARMUP_ENV: &str = "MATBENCH_WARMUP";

const DEFAULT_SIZE: usize = 1024;
const DEFAULT_WARMUP: usize = 100;

/// Benchmark parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BenchConfig {
    /// Matrix side length N.
    pub size: usize,
    /// Offload plan executions run before the timed one.
    pub warmup: usize,
}

impl Default for BenchConfig {
    fn default() -> Self {
        BenchConfig {
            size: DEFAULT_SIZE,
            warmup: DEFAULT_WARMUP,
        }
    }
}

impl BenchConfig {
    /// Defaults, overridden by `MATBENCH_SIZE` and `MATBENCH_WARMUP` when set.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Like `from_env`, reading values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = BenchConfig::default();

        if let Some(value) = lookup(SIZE_ENV) {
            config.size = parse(SIZE_ENV, &value)?;
            if config.size == 0 {
                return Err(invalid(SIZE_ENV, &value, "matrix size must be positive"));
            }
        }
        if let Some(value) = lookup(WARMUP_ENV) {
            config.warmup = parse(WARMUP_ENV, &value)?;
        }

        Ok(config)
    }
}

fn parse(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|err| invalid(key, value, &err.to_string()))
}

fn invalid(key: &str, value: &str, reason: &str) -> BenchError {
    BenchError::InvalidConfig {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
