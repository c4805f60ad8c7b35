use crate::{Error, Result};

use tokio::time::Duration;

// For explanation, see issue: https://github.com/serde-rs/serde/issues/368
fn default_max_mempool_nonce_count() -> usize {
    100_000
}
fn default_stream_timeout_ms() -> u64 {
    10_000
}
fn default_protocol_id() -> String {
    "/raintree/1.0.0".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct RainTreeConfig {
    /// Capacity of the set of delivered nonces.
    #[serde(default = "default_max_mempool_nonce_count")]
    pub max_mempool_nonce_count: usize,
    /// Bounds opening, writing and closing an outbound stream, and reading an inbound one.
    #[serde(default = "default_stream_timeout_ms")]
    pub stream_timeout_ms: u64,
    #[serde(default = "default_protocol_id")]
    pub protocol_id: String,
    /// When false, peers can neither be added nor removed after start.
    #[serde(default = "default_true")]
    pub is_dynamic_peer_set: bool,
}

impl Default for RainTreeConfig {
    fn default() -> Self {
        RainTreeConfig {
            max_mempool_nonce_count: default_max_mempool_nonce_count(),
            stream_timeout_ms: default_stream_timeout_ms(),
            protocol_id: default_protocol_id(),
            is_dynamic_peer_set: default_true(),
        }
    }
}

impl RainTreeConfig {
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_mempool_nonce_count == 0 {
            return Err(Error::InvalidConfig("max_mempool_nonce_count must be positive".to_owned()));
        }
        if self.stream_timeout_ms == 0 {
            return Err(Error::InvalidConfig("stream_timeout_ms must be positive".to_owned()));
        }
        if self.protocol_id.is_empty() {
            return Err(Error::InvalidConfig("protocol_id is empty".to_owned()));
        }
        Ok(())
    }
}
