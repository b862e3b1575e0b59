//! Fixed-rate tick clock for headless clients.
//!
//! A game engine with its own frame loop calls
//! [`Dispatcher::tick`](crate::Dispatcher::tick) from that loop and never
//! needs this. Bots, load generators, and the demo have no frame loop, so
//! [`TickClock`] provides one:
//!
//! ```ignore
//! let mut clock = TickClock::with_rate(60);
//! loop {
//!     tokio::select! {
//!         _ = &mut stop => break,
//!         info = clock.wait_for_tick() => {
//!             dispatcher.tick();
//!             clock.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when a tick fires late.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LatePolicy {
    /// Forget the missed ticks and schedule the next one a full period
    /// from now.
    #[default]
    Skip,
    /// Fire missed ticks back to back, at most `max_burst` of them, then
    /// fall back to skipping.
    Burst { max_burst: u32 },
    /// Keep the original cadence; the next tick is due one period after
    /// the missed deadline, however late this one was.
    Keep,
}

/// Settings for a [`TickClock`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Ticks per second, `1..=MAX_TICK_RATE_HZ`.
    pub tick_rate_hz: u32,
    pub late_policy: LatePolicy,
    /// Fraction of the tick period (0.0–1.0) that the work between
    /// `wait_for_tick` and `record_tick_end` may take before a warning.
    pub budget_warn_threshold: f64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 60,
            late_policy: LatePolicy::default(),
            budget_warn_threshold: 0.8,
        }
    }
}

impl ClockConfig {
    /// Highest supported tick rate.
    pub const MAX_TICK_RATE_HZ: u32 = 240;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values.
    ///
    /// A client clock always ticks, so a rate of 0 becomes 1.
    pub fn validated(mut self) -> Self {
        let clamped = self.tick_rate_hz.clamp(1, Self::MAX_TICK_RATE_HZ);
        if clamped != self.tick_rate_hz {
            warn!(
                rate = self.tick_rate_hz,
                clamped,
                "tick_rate_hz out of range, clamping"
            );
            self.tick_rate_hz = clamped;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

// ---------------------------------------------------------------------------
// TickInfo / ClockStats
// ---------------------------------------------------------------------------

/// Returned by [`TickClock::wait_for_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickInfo {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Fixed step (`1 / tick_rate`). Use this, not wall-clock time, to
    /// advance simulation.
    pub dt: Duration,
    /// Fired more than 10% of a period after its deadline.
    pub late: bool,
    /// Ticks dropped because of lateness (0 normally).
    pub ticks_skipped: u64,
}

/// Counters and timings for a [`TickClock`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClockStats {
    pub ticks: u64,
    pub late_ticks: u64,
    pub skipped_ticks: u64,
    /// Longest time between `wait_for_tick` returning and
    /// `record_tick_end`.
    pub max_work_time: Duration,
    /// Share of the period used by the most recent tick's work.
    pub last_utilization: f64,
}

// ---------------------------------------------------------------------------
// TickClock
// ---------------------------------------------------------------------------

/// Paces a loop at a fixed rate.
#[derive(Debug)]
pub struct TickClock {
    config: ClockConfig,
    period: Duration,
    tick_count: u64,
    next_tick: TokioInstant,
    /// Late ticks still owed under [`LatePolicy::Burst`].
    burst_remaining: u64,
    work_started: Option<Instant>,
    paused: bool,
    stats: ClockStats,
}

impl TickClock {
    pub fn new(config: ClockConfig) -> Self {
        let config = config.validated();
        let period = config.tick_duration();
        debug!(
            rate_hz = config.tick_rate_hz,
            period_ms = period.as_secs_f64() * 1000.0,
            policy = ?config.late_policy,
            "tick clock created"
        );
        Self {
            next_tick: TokioInstant::now() + period,
            config,
            period,
            tick_count: 0,
            burst_remaining: 0,
            work_started: None,
            paused: false,
            stats: ClockStats::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(ClockConfig::with_rate(tick_rate_hz))
    }

    /// Waits until the next tick is due.
    ///
    /// While paused this never resolves, which is what a `select!` loop
    /// wants.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        if self.paused {
            std::future::pending::<()>().await;
        }

        let deadline = self.next_tick;
        time::sleep_until(deadline).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.work_started = Some(Instant::now());

        let late_by = now.saturating_duration_since(deadline);
        let late = late_by > self.period / 10;
        let behind = if late {
            (late_by.as_nanos() / self.period.as_nanos().max(1)) as u64
        } else {
            0
        };

        let mut ticks_skipped = 0;
        self.next_tick = match self.config.late_policy {
            LatePolicy::Skip => {
                ticks_skipped = behind;
                now + self.period
            }
            LatePolicy::Burst { max_burst } => {
                if behind > 0 && self.burst_remaining == 0 {
                    self.burst_remaining = behind.min(u64::from(max_burst));
                    ticks_skipped = behind - self.burst_remaining;
                }
                if self.burst_remaining > 0 {
                    self.burst_remaining -= 1;
                    now
                } else {
                    now + self.period
                }
            }
            LatePolicy::Keep => deadline + self.period,
        };

        if ticks_skipped > 0 {
            warn!(
                tick = self.tick_count,
                skipped = ticks_skipped,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "tick clock fell behind"
            );
        }
        if late {
            self.stats.late_ticks += 1;
        }
        self.stats.skipped_ticks += ticks_skipped;
        self.stats.ticks += 1;

        trace!(tick = self.tick_count, late, "tick");

        TickInfo {
            tick: self.tick_count,
            dt: self.period,
            late,
            ticks_skipped,
        }
    }

    /// Marks the end of this tick's work, for budget tracking.
    ///
    /// A no-op if no tick is in progress.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.work_started.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.period.as_secs_f64();
        self.stats.last_utilization = utilization;
        self.stats.max_work_time = self.stats.max_work_time.max(elapsed);

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.period.as_secs_f64() * 1000.0,
                "tick work near or over budget"
            );
        }
    }

    /// Stops ticking until [`resume`](Self::resume). Idempotent.
    pub fn pause(&mut self) {
        if !self.paused {
            self.paused = true;
            debug!(tick = self.tick_count, "tick clock paused");
        }
    }

    /// Resumes ticking one full period from now, so the pause does not
    /// turn into a burst of late ticks.
    pub fn resume(&mut self) {
        if self.paused {
            self.paused = false;
            self.next_tick = TokioInstant::now() + self.period;
            self.burst_remaining = 0;
            debug!(tick = self.tick_count, "tick clock resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn tick_duration(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> &ClockStats {
        &self.stats
    }
}
