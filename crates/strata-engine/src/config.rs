//! Engine and supervisor configuration, and their validation errors.

use std::time::Duration;

use thiserror::Error;

// ── EngineConfig ───────────────────────────────────────────────────

/// Configuration of an [`Engine`](crate::Engine).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Number of workers agents are fanned out to during perception,
    /// revision and decision. `None` = auto-detect
    /// (`available_parallelism`, or 1 if probing fails). Default: `Some(1)`.
    pub workers: Option<usize>,
    /// Seed every per-agent and per-level generator is derived from.
    /// Default: 0.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: Some(1),
            seed: 0,
        }
    }
}

impl EngineConfig {
    /// Upper bound applied to explicit worker counts.
    pub const MAX_WORKERS: usize = 256;

    /// Resolve the actual worker count, applying auto-detection if `None`.
    ///
    /// Explicit values are clamped to `[1, 256]`.
    pub fn resolved_worker_count(&self) -> usize {
        match self.workers {
            Some(n) => n.clamp(1, Self::MAX_WORKERS),
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

// ── SupervisorConfig ───────────────────────────────────────────────

/// Configuration of a [`Supervisor`](crate::Supervisor).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long the driver waits on the pause condition before checking
    /// for an abort again. Default: 100 ms. Must lie in `(0, 1 s]`.
    pub pause_poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            pause_poll_interval: Duration::from_millis(100),
        }
    }
}

impl SupervisorConfig {
    /// Longest allowed pause poll interval.
    pub const MAX_PAUSE_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPollInterval`] if the interval is zero
    /// or longer than one second.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pause_poll_interval.is_zero()
            || self.pause_poll_interval > Self::MAX_PAUSE_POLL_INTERVAL
        {
            return Err(ConfigError::InvalidPollInterval {
                value: self.pause_poll_interval,
            });
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a configuration or starting threads.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Pause poll interval is zero or longer than one second.
    #[error("pause poll interval must lie in (0, 1s], got {value:?}")]
    InvalidPollInterval {
        /// The rejected interval.
        value: Duration,
    },
    /// A background thread could not be spawned.
    #[error("failed to spawn thread: {reason}")]
    ThreadSpawnFailed {
        /// Description of which thread failed.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_worker_count_is_clamped() {
        let mut config = EngineConfig {
            workers: Some(0),
            seed: 1,
        };
        assert_eq!(config.resolved_worker_count(), 1);
        config.workers = Some(10_000);
        assert_eq!(config.resolved_worker_count(), EngineConfig::MAX_WORKERS);
        config.workers = Some(8);
        assert_eq!(config.resolved_worker_count(), 8);
    }

    #[test]
    fn auto_detected_worker_count_is_positive() {
        let config = EngineConfig {
            workers: None,
            seed: 0,
        };
        assert!(config.resolved_worker_count() >= 1);
    }

    #[test]
    fn poll_interval_bounds() {
        assert!(SupervisorConfig::default().validate().is_ok());
        let zero = SupervisorConfig {
            pause_poll_interval: Duration::ZERO,
        };
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidPollInterval { .. })
        ));
        let long = SupervisorConfig {
            pause_poll_interval: Duration::from_millis(1001),
        };
        assert!(long.validate().is_err());
        let max = SupervisorConfig {
            pause_poll_interval: Duration::from_secs(1),
        };
        assert!(max.validate().is_ok());
    }
}
