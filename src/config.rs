use std::time::Duration;

use crate::probes::Probe;

/// Knobs for the detection engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Ceiling on match rules evaluated at once for one response.
    pub max_concurrent_matches: usize,
    /// Largest response read from a transport, in bytes.
    pub read_size: usize,
    /// Read timeout used when a probe carries no usable `totalwaitms`.
    pub read_timeout: Duration,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_matches: 20,
            read_size: 4096,
            read_timeout: Duration::from_millis(3000),
        }
    }
}

impl DetectorConfig {
    pub fn with_max_concurrent_matches(mut self, limit: usize) -> Self {
        self.max_concurrent_matches = limit.max(1);
        self
    }

    pub fn with_read_size(mut self, bytes: usize) -> Self {
        self.read_size = bytes;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Read timeout for `probe`, preferring its own `totalwaitms`.
    pub fn timeout_for(&self, probe: &Probe) -> Duration {
        probe.total_wait().unwrap_or(self.read_timeout)
    }
}
