//! Dispatcher configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the dispatcher does with buffered frames while the connection is
/// down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectPolicy {
    /// Deliver nothing while disconnected. Frames already queued stay
    /// queued and are delivered only if the same connection reports
    /// connected again. The built-in TCP and WebSocket connections never
    /// do, so for them the held frames are never delivered; pick
    /// [`Drain`](Self::Drain) to consume everything a server sent before
    /// hanging up.
    #[default]
    Hold,
    /// Keep delivering frames that were queued before the disconnect.
    Drain,
}

/// Settings for a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Upper bound on frames handed to the handler per tick.
    ///
    /// The default of 1 keeps per-frame work flat: a burst of N frames is
    /// spread over N ticks instead of stalling one.
    pub max_frames_per_tick: usize,
    /// Behavior while the connection is down.
    pub disconnect_policy: DisconnectPolicy,
    /// Optional pause between reads in the receive loop, in milliseconds.
    pub receive_pause_ms: Option<u64>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_frames_per_tick: 1,
            disconnect_policy: DisconnectPolicy::default(),
            receive_pause_ms: None,
        }
    }
}

impl DispatchConfig {
    /// Fixes out-of-range values. `max_frames_per_tick` of 0 would starve
    /// the handler forever, so it becomes 1.
    pub fn validated(mut self) -> Self {
        if self.max_frames_per_tick == 0 {
            warn!("max_frames_per_tick is 0, using 1");
            self.max_frames_per_tick = 1;
        }
        self
    }

    pub fn receive_pause(&self) -> Option<Duration> {
        self.receive_pause_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }
}
