//! Pipeline configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default pause after each successful upload
pub const DEFAULT_THROTTLE_MS: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Sleep after every successful upload, in milliseconds (0 disables)
    pub throttle_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            throttle_ms: DEFAULT_THROTTLE_MS,
        }
    }
}

impl IngestConfig {
    pub fn without_throttle() -> Self {
        Self { throttle_ms: 0 }
    }

    pub fn throttle(&self) -> Option<Duration> {
        (self.throttle_ms > 0).then(|| Duration::from_millis(self.throttle_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle() {
        assert_eq!(IngestConfig::default().throttle(), Some(Duration::from_millis(100)));
        assert_eq!(IngestConfig::without_throttle().throttle(), None);
        let parsed: IngestConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed, IngestConfig::default());
    }
}
