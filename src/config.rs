use std::time::Duration;

pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(30);

pub const TIME_LIMIT_ENV: &str = "CUT_TIME_LIMIT_MS";
pub const THREADS_ENV: &str = "CUT_THREADS";

/// Settings shared by every per-material solve in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolverConfig {
    /// Wall-clock budget for a single material code.
    pub time_limit: Duration,
    /// Worker threads for the batch (0 = rayon default).
    pub threads: usize,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: DEFAULT_TIME_LIMIT,
            threads: 0,
        }
    }
}

impl SolverConfig {
    pub fn with_time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = time_limit;
        self
    }

    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Defaults overridden by `CUT_TIME_LIMIT_MS` and `CUT_THREADS`.
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup(TIME_LIMIT_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) => config.time_limit = Duration::from_millis(ms),
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {TIME_LIMIT_ENV}"),
            }
        }
        if let Some(raw) = lookup(THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(threads) => config.threads = threads,
                Err(_) => tracing::warn!(value = %raw, "ignoring invalid {THREADS_ENV}"),
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SolverConfig::default();
        assert_eq!(config.time_limit, Duration::from_secs(30));
        assert_eq!(config.threads, 0);
    }

    #[test]
    fn test_lookup_overrides() {
        let config = SolverConfig::from_lookup(|key| match key {
            TIME_LIMIT_ENV => Some("1500".to_string()),
            THREADS_ENV => Some(" 4 ".to_string()),
            _ => None,
        });
        assert_eq!(config.time_limit, Duration::from_millis(1500));
        assert_eq!(config.threads, 4);
    }

    #[test]
    fn test_lookup_ignores_garbage() {
        let config = SolverConfig::from_lookup(|key| match key {
            TIME_LIMIT_ENV => Some("soon".to_string()),
            _ => None,
        });
        assert_eq!(config, SolverConfig::default());
    }
}
