use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::SyncError;


const DEFAULT_POLL_INTERVAL_MS: u64 = 4000;

/// Timing configuration shared by every readable of a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// Interval between two fetches of a polling readable.
    pub poll_interval_ms: u64,
    /// Interval at which the clock ticker re-evaluates time-dependent statuses.
    ///
    /// Falls back to `poll_interval_ms` when absent.
    pub clock_tick_ms: Option<u64>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            clock_tick_ms: None,
        }
    }
}

impl SyncConfig {
    /// Parses and validates a JSON configuration. Missing fields take their default values.
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| SyncError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.poll_interval_ms == 0 {
            return Err(SyncError::Config("`poll_interval_ms` must be positive".into()));
        }
        if self.clock_tick_ms == Some(0) {
            return Err(SyncError::Config("`clock_tick_ms` must be positive".into()));
        }
        Ok(())
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }
    pub fn with_clock_tick(mut self, interval: Duration) -> Self {
        self.clock_tick_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms.unwrap_or(self.poll_interval_ms).max(1))
    }
}
