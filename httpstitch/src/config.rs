//! Runtime configuration.
//!
//! Callers load a [`Config`] from a TOML file (or start from [`Config::default`])
//! and pass it to the assembler. Every tunable has a sensible default so a
//! config file only needs to override what it cares about.

use std::fs;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Runtime configuration for the assembler.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Only track connections touching this address, if set.
    #[serde(default)]
    pub filter_ip: Option<IpAddr>,

    /// Only track connections touching this port, if set.
    #[serde(default)]
    pub filter_port: Option<u16>,

    /// A segment carrying more than this many bytes of payload is considered
    /// "fragmented" for timing purposes.
    #[serde(default = "default_fragment_threshold")]
    pub fragment_threshold: usize,

    /// A segment carrying more than this many bytes of payload counts as "not
    /// a pure ACK" and extends the in-flight timing record.
    #[serde(default = "default_ack_pure_threshold")]
    pub ack_pure_threshold: usize,

    /// Initial capacity of a connection's receive window, in segments.
    #[serde(default = "default_window_initial_capacity")]
    pub window_initial_capacity: usize,

    /// Capacity of the bounded handoff channel between capture and consumer.
    #[serde(default = "default_handoff_capacity")]
    pub handoff_capacity: usize,

    /// Hard cap on out-of-order segments buffered per direction before the
    /// connection is torn down. `None` means unbounded.
    #[serde(default = "default_max_out_of_order")]
    pub max_out_of_order: Option<usize>,

    /// Connections idle longer than this are evicted by `flush_older_than`.
    #[serde(with = "humantime_duration", default = "default_idle_timeout")]
    pub idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            filter_ip: None,
            filter_port: None,
            fragment_threshold: default_fragment_threshold(),
            ack_pure_threshold: default_ack_pure_threshold(),
            window_initial_capacity: default_window_initial_capacity(),
            handoff_capacity: default_handoff_capacity(),
            max_out_of_order: default_max_out_of_order(),
            idle_timeout: default_idle_timeout(),
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file, falling back to defaults for any
    /// field the file omits.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }
}

fn default_fragment_threshold() -> usize {
    1400
}

fn default_ack_pure_threshold() -> usize {
    100
}

fn default_window_initial_capacity() -> usize {
    64
}

fn default_handoff_capacity() -> usize {
    1024
}

fn default_max_out_of_order() -> Option<usize> {
    Some(10_000)
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(300)
}

/// Serializes a `Duration` as a plain seconds count, since `toml` has no
/// native duration type.
mod humantime_duration {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let secs = u64::deserialize(d)?;
        Ok(Duration::from_secs(secs))
    }
}
