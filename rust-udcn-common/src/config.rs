//! Node configuration, loaded from TOML and/or environment variables via the
//! `config` crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{MAX_CS_ENTRIES, MAX_FIB_ENTRIES, MAX_PIT_ENTRIES};

/// Pending Interest Table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PitConfig {
    /// Capacity before the PIT starts rejecting new names (existing names
    /// still aggregate).
    pub capacity: usize,
    /// Interest lifetime applied when an Interest doesn't specify one, in
    /// milliseconds.
    pub default_lifetime_ms: u64,
    /// Number of times an unsatisfied entry is retransmitted before being
    /// dropped and a `PitTimeout` Nack sent downstream.
    pub retransmits: u32,
}

impl Default for PitConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_PIT_ENTRIES,
            default_lifetime_ms: 4000,
            retransmits: 3,
        }
    }
}

/// Content Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsConfig {
    /// Maximum number of entries kept before LRU eviction kicks in.
    pub capacity: usize,
    /// Default TTL applied to inserted content that doesn't carry one, in
    /// milliseconds.
    pub default_ttl_ms: u64,
}

impl Default for CsConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_CS_ENTRIES,
            default_ttl_ms: 10_000,
        }
    }
}

/// Forwarding Information Base configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FibConfig {
    /// Maximum number of distinct prefixes.
    pub capacity: usize,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            capacity: MAX_FIB_ENTRIES,
        }
    }
}

/// Session overlay configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Name component that triggers session establishment.
    pub initiator_tag: String,
    /// Name component prefix used for session-scoped reconnect traffic.
    pub identifier_tag: String,
    /// Number of random bytes in a generated session token, before URL-safe
    /// encoding.
    pub token_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initiator_tag: "session_connector".to_string(),
            identifier_tag: "sid".to_string(),
            token_bytes: 16,
        }
    }
}

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Human-readable node name, used in logging and debug `Display` impls.
    pub node_name: String,
    /// Interval between ageing-task ticks, in milliseconds.
    pub ageing_interval_ms: u64,
    /// Address the management textual protocol listens on.
    pub management_listen_addr: String,
    /// Whether Interests arriving from the network are also forwarded to the
    /// local application/repository queue, in addition to any FIB upstream.
    pub deliver_interests_to_app: bool,
    pub pit: PitConfig,
    pub cs: CsConfig,
    pub fib: FibConfig,
    pub session: SessionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_name: "udcn-node".to_string(),
            ageing_interval_ms: 1000,
            management_listen_addr: "127.0.0.1:9696".to_string(),
            deliver_interests_to_app: false,
            pit: PitConfig::default(),
            cs: CsConfig::default(),
            fib: FibConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from a TOML file, falling back to defaults for any
    /// field the file omits, and allowing `UDCN_*` environment variables to
    /// override individual fields (e.g. `UDCN_AGEING_INTERVAL_MS`).
    pub fn load(path: Option<&str>) -> crate::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(config::Environment::with_prefix("UDCN").separator("_"));

        let cfg = builder
            .build()
            .map_err(|e| crate::Error::Config(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| crate::Error::Config(e.to_string()))
    }

    pub fn ageing_interval(&self) -> Duration {
        Duration::from_millis(self.ageing_interval_ms)
    }
}
