//! Engine configuration, validation, and error types.
//!
//! [`EngineConfig`] is a plain struct with documented defaults. It can be
//! built in code, or loaded from TOML where every key is optional.
//! [`validate()`](EngineConfig::validate) checks ranges once at startup.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── ConfigError ────────────────────────────────────────────────────

/// Errors from loading or validating an [`EngineConfig`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config: {0}")]
    Io(String),
    /// The config text is not valid TOML for this struct.
    #[error("failed to parse config: {0}")]
    Parse(String),
    /// A field holds a value outside its allowed range.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// The offending field name.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

// ── EngineConfig ───────────────────────────────────────────────────

/// Every tunable of the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Local address the datagram socket binds to. Default: `127.0.0.1`.
    pub bind_address: String,
    /// Local port; `0` picks an ephemeral port. Default: 5011.
    pub bind_port: u16,
    /// Address outbound commands are sent to. Default: `127.0.0.1`.
    pub peer_address: String,
    /// Port outbound commands are sent to. Default: 5012.
    pub peer_port: u16,
    /// Ingestion queue bound. Default: 1024.
    pub queue_capacity: usize,
    /// Receive buffer size and decode bound, in bytes. Default: 32768.
    pub max_datagram_size: usize,
    /// Retries after a failed send before the packet is dropped. Default: 3.
    pub send_retry_limit: u32,
    /// Delay before the first retry, doubled on each further retry. Default: 5 ms.
    pub send_backoff_ms: u64,
    /// Outbound command queue bound. Default: 256.
    pub outbound_capacity: usize,
    /// Forwarder retry buffer bound. Default: 256.
    pub publish_retry_bound: usize,
    /// Forwarder dispatch channel bound. Default: 1024.
    pub publish_capacity: usize,
    /// How often the forwarder retries buffered payloads. Default: 50 ms.
    pub publish_retry_ms: u64,
    /// Seconds between recorded snapshots while recording. Default: 0.1.
    pub snapshot_interval: f64,
    /// Seconds moved by one playback jump. Default: 5.0.
    pub jump_step: f64,
    /// Host tick rate used by `ardan-node`. Default: 60.
    pub tick_rate_hz: f64,
    /// Datagram target for the per-entity sink channel. Default: none.
    pub sink_entity_address: Option<String>,
    /// Datagram target for the fleet-wide sink channel. Default: none.
    pub sink_fleet_address: Option<String>,
    /// Receive-loop read timeout, bounding shutdown latency. Default: 100 ms.
    pub recv_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".into(),
            bind_port: 5011,
            peer_address: "127.0.0.1".into(),
            peer_port: 5012,
            queue_capacity: 1024,
            max_datagram_size: ardan_wire::MAX_DATAGRAM_SIZE,
            send_retry_limit: 3,
            send_backoff_ms: 5,
            outbound_capacity: 256,
            publish_retry_bound: 256,
            publish_capacity: 1024,
            publish_retry_ms: 50,
            snapshot_interval: 0.1,
            jump_step: 5.0,
            tick_rate_hz: 60.0,
            sink_entity_address: None,
            sink_fleet_address: None,
            recv_timeout_ms: 100,
        }
    }
}

/// Smallest accepted datagram bound. Holds every command packet.
const MIN_DATAGRAM_SIZE: usize = 16;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive_finite(field: &'static str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be finite and positive, got {v}")))
    }
}

impl EngineConfig {
    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        let cfg = Self::from_toml_str(&text)?;
        log::info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Parse from TOML text and validate.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check every field against its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if !(MIN_DATAGRAM_SIZE..=ardan_wire::MAX_DATAGRAM_SIZE).contains(&self.max_datagram_size) {
            return Err(invalid(
                "max_datagram_size",
                format!(
                    "must be within {MIN_DATAGRAM_SIZE}..={}, got {}",
                    ardan_wire::MAX_DATAGRAM_SIZE,
                    self.max_datagram_size
                ),
            ));
        }
        if self.outbound_capacity == 0 {
            return Err(invalid("outbound_capacity", "must be at least 1"));
        }
        if self.publish_retry_bound == 0 {
            return Err(invalid("publish_retry_bound", "must be at least 1"));
        }
        if self.publish_capacity == 0 {
            return Err(invalid("publish_capacity", "must be at least 1"));
        }
        if self.recv_timeout_ms == 0 {
            return Err(invalid("recv_timeout_ms", "must be at least 1"));
        }
        if self.publish_retry_ms == 0 {
            return Err(invalid("publish_retry_ms", "must be at least 1"));
        }
        positive_finite("snapshot_interval", self.snapshot_interval)?;
        positive_finite("jump_step", self.jump_step)?;
        positive_finite("tick_rate_hz", self.tick_rate_hz)?;
        if self.bind_address.is_empty() {
            return Err(invalid("bind_address", "must not be empty"));
        }
        if self.peer_address.is_empty() {
            return Err(invalid("peer_address", "must not be empty"));
        }
        Ok(())
    }

    /// `bind_address:bind_port`.
    pub fn bind_endpoint(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// `peer_address:peer_port`.
    pub fn peer_endpoint(&self) -> String {
        format!("{}:{}", self.peer_address, self.peer_port)
    }

    /// Receive-loop read timeout.
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Forwarder retry interval.
    pub fn publish_retry_interval(&self) -> Duration {
        Duration::from_millis(self.publish_retry_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        assert_eq!(cfg.max_datagram_size, 32 * 1024);
        assert_eq!(cfg.bind_endpoint(), "127.0.0.1:5011");
        assert_eq!(cfg.peer_endpoint(), "127.0.0.1:5012");
    }

    #[test]
    fn zero_queue_is_rejected() {
        let cfg = EngineConfig {
            queue_capacity: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Invalid {
                field: "queue_capacity",
                ..
            })
        ));
    }

    #[test]
    fn datagram_bound_is_clamped_to_wire_limit() {
        for size in [0, 15, 32 * 1024 + 1] {
            let cfg = EngineConfig {
                max_datagram_size: size,
                ..EngineConfig::default()
            };
            assert!(cfg.validate().is_err(), "size {size} accepted");
        }
    }

    #[test]
    fn non_finite_intervals_are_rejected() {
        let cfg = EngineConfig {
            snapshot_interval: f64::NAN,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
        let cfg = EngineConfig {
            jump_step: -1.0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EngineConfig::from_toml_str(
            r#"
            bind_port = 0
            queue_capacity = 8
            sink_fleet_address = "127.0.0.1:6000"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.bind_port, 0);
        assert_eq!(cfg.queue_capacity, 8);
        assert_eq!(cfg.sink_fleet_address.as_deref(), Some("127.0.0.1:6000"));
        assert_eq!(cfg.peer_port, 5012);
    }

    #[test]
    fn bad_toml_is_parse_error() {
        assert!(matches!(
            EngineConfig::from_toml_str("queue_capacity = \"many\""),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_toml_str("queue_capacity = 0"),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
