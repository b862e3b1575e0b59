//! Client configuration.
//!
//! Every field has a default, so a config file only needs the fields it
//! changes:
//!
//! ```json
//! { "address": "play.example.com:7777", "tick_rate_hz": 30 }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use tickwire_dispatch::{ClockConfig, DispatchConfig, LatePolicy};
use tickwire_protocol::{CodecConfig, DEFAULT_MAX_DEPTH};
use tickwire_transport::FrameConfig;

use crate::TickwireError;

/// Which transport [`GameClient`](crate::GameClient) dials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Length-prefixed frames over TCP.
    #[default]
    Tcp,
    /// Binary WebSocket messages.
    #[cfg(feature = "websocket")]
    WebSocket,
}

/// Settings for a [`GameClient`](crate::GameClient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// `host:port`, or a `ws://` URL for the WebSocket transport.
    pub address: String,
    pub transport: TransportKind,
    /// Ticks per second for [`GameClient::run_until`](crate::GameClient::run_until).
    pub tick_rate_hz: u32,
    pub late_policy: LatePolicy,
    pub dispatch: DispatchConfig,
    /// Largest frame accepted or sent over TCP, in bytes.
    pub max_payload_size: u32,
    /// Deepest container nesting accepted when decoding.
    pub max_depth: usize,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7777".to_string(),
            transport: TransportKind::default(),
            tick_rate_hz: 60,
            late_policy: LatePolicy::default(),
            dispatch: DispatchConfig::default(),
            max_payload_size: FrameConfig::default().max_payload_size,
            max_depth: DEFAULT_MAX_DEPTH,
            log_filter: "info".to_string(),
        }
    }
}

impl ClientConfig {
    /// Parses a JSON config.
    pub fn from_json_str(json: &str) -> Result<Self, TickwireError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, TickwireError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| TickwireError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Clamps out-of-range values, warning about each one.
    pub fn validated(mut self) -> Self {
        let rate = self.tick_rate_hz.clamp(1, ClockConfig::MAX_TICK_RATE_HZ);
        if rate != self.tick_rate_hz {
            warn!(
                rate = self.tick_rate_hz,
                clamped = rate,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = rate;
        }
        if self.max_depth == 0 {
            warn!("max_depth is 0, using default");
            self.max_depth = DEFAULT_MAX_DEPTH;
        }
        if self.max_payload_size == 0 {
            warn!("max_payload_size is 0, using default");
            self.max_payload_size = FrameConfig::default().max_payload_size;
        }
        self.dispatch = self.dispatch.validated();
        self
    }

    pub fn clock_config(&self) -> ClockConfig {
        ClockConfig {
            tick_rate_hz: self.tick_rate_hz,
            late_policy: self.late_policy,
            ..ClockConfig::default()
        }
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
        }
    }

    pub fn codec_config(&self) -> CodecConfig {
        CodecConfig {
            max_depth: self.max_depth,
        }
    }
}

#[cfg(test)]
mod tests {
    use tickwire_dispatch::DisconnectPolicy;

    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = ClientConfig::default();
        assert_eq!(cfg.address, "127.0.0.1:7777");
        assert_eq!(cfg.transport, TransportKind::Tcp);
        assert_eq!(cfg.tick_rate_hz, 60);
        assert_eq!(cfg.dispatch.max_frames_per_tick, 1);
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let cfg = ClientConfig::from_json_str(
            r#"{ "tick_rate_hz": 30, "dispatch": { "disconnect_policy": "drain" } }"#,
        )
        .unwrap();
        assert_eq!(cfg.tick_rate_hz, 30);
        assert_eq!(cfg.dispatch.disconnect_policy, DisconnectPolicy::Drain);
        assert_eq!(cfg.dispatch.max_frames_per_tick, 1);
        assert_eq!(cfg.address, "127.0.0.1:7777");
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = ClientConfig::from_json_str(r#"{ "tick_rate_hz": "fast" }"#).unwrap_err();
        assert!(matches!(err, TickwireError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_file_error() {
        let err = ClientConfig::from_json_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, TickwireError::ConfigFile { .. }));
    }

    #[test]
    fn test_validated_clamps() {
        let cfg = ClientConfig {
            tick_rate_hz: 0,
            max_depth: 0,
            dispatch: DispatchConfig {
                max_frames_per_tick: 0,
                ..Default::default()
            },
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.tick_rate_hz, 1);
        assert_eq!(cfg.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.dispatch.max_frames_per_tick, 1);

        let cfg = ClientConfig {
            tick_rate_hz: 1_000,
            ..Default::default()
        }
        .validated();
        assert_eq!(cfg.tick_rate_hz, ClockConfig::MAX_TICK_RATE_HZ);
    }

    #[test]
    fn test_derived_configs() {
        let cfg = ClientConfig {
            tick_rate_hz: 20,
            max_payload_size: 4096,
            max_depth: 8,
            ..Default::default()
        };
        assert_eq!(cfg.clock_config().tick_rate_hz, 20);
        assert_eq!(cfg.frame_config().max_payload_size, 4096);
        assert_eq!(cfg.codec_config().max_depth, 8);
    }
}
