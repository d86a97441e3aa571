//! Configuration schema.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Process-wide settings
    #[serde(default)]
    pub global: GlobalConfig,

    /// Status/metrics endpoint settings
    #[serde(default)]
    pub status: StatusConfig,

    /// Upstream group definitions
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    /// Minimum level emitted: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Bytes available to the shared statistics arena.
    ///
    /// Every upstream allocates its per-peer counter slots from this
    /// region; sizing it too small is a fatal startup error.
    #[serde(default = "default_shared_region_size")]
    pub shared_region_size: usize,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Json,
            shared_region_size: default_shared_region_size(),
        }
    }
}

/// How log lines are rendered.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Status endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusConfig {
    /// Whether the status/metrics HTTP endpoint is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Address to bind the status server
    #[serde(default = "default_status_address")]
    pub address: SocketAddr,
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_status_address(),
        }
    }
}

/// Upstream group configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique name for this upstream group
    pub name: String,

    /// Affinity-token extraction and matching rules
    #[serde(default)]
    pub affinity: AffinityConfig,

    /// List of upstream servers
    pub servers: Vec<ServerConfig>,
}

/// Affinity-token extraction and matching rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AffinityConfig {
    /// Cookie field name carrying the session token
    #[serde(default = "default_cookie")]
    pub cookie: String,

    /// URL parameter name searched when the cookie is absent
    /// (defaults to the cookie name)
    #[serde(default)]
    pub url_param: Option<String>,

    /// How tokens are compared against peer routes
    #[serde(default, rename = "match")]
    pub match_mode: MatchMode,
}

impl Default for AffinityConfig {
    fn default() -> Self {
        Self {
            cookie: default_cookie(),
            url_param: None,
            match_mode: MatchMode::Prefix,
        }
    }
}

/// Token-to-route comparison mode.
///
/// `Prefix` expects tokens of the form `<route><rest>`; `Suffix` supports
/// routes appended to an opaque session id, e.g. `<session>.<route>`.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Prefix,
    Suffix,
}

/// Individual server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Server address and port
    pub address: SocketAddr,

    /// Affinity identifier matched against session tokens
    pub route: String,

    /// Weight for the round-robin fallback (0 = never picked by fallback)
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Consecutive failures before the peer is circuit-broken (0 = never)
    #[serde(default = "default_max_fails")]
    pub max_fails: u32,

    /// Cooldown after which a circuit-broken peer becomes eligible again
    #[serde(default = "default_fail_timeout", with = "humantime_serde")]
    pub fail_timeout: Duration,

    /// Administratively down: excluded from selection entirely
    #[serde(default)]
    pub down: bool,

    /// Backup servers are tracked but left to an external failover tier
    #[serde(default)]
    pub backup: bool,
}

// Serde default helpers
fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_status_address() -> SocketAddr {
    "127.0.0.1:9090".parse().unwrap()
}

fn default_shared_region_size() -> usize {
    64 * 1024
}

fn default_cookie() -> String {
    "JSESSIONID".to_string()
}

fn default_weight() -> u32 {
    1
}

fn default_max_fails() -> u32 {
    1
}

fn default_fail_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Serde bridge for durations written as humantime text ("10s", "1m 30s").
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
