//! Periodic sweep scheduler for Geoduel's session janitor.
//!
//! The janitor is the backstop for sessions nobody ended: a duellist
//! whose network vanished without a clean disconnect, a deadline task
//! that never ran. Every interval it asks the engine to expire overdue
//! sessions.
//!
//! # Disabled mode
//!
//! When `interval` is zero, [`SweepScheduler::wait_for_sweep`] pends
//! forever. Tests that drive expiry by hand use this.
//!
//! # Integration
//!
//! The scheduler owns only timing; the caller owns the sweep:
//!
//! ```ignore
//! loop {
//!     let info = scheduler.wait_for_sweep().await;
//!     let expired = engine.expire_overdue(Instant::now()).await;
//!     scheduler.record_sweep(expired);
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the sweep scheduler.
#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Time between sweeps. Zero disables sweeping.
    pub interval: Duration,
    /// Random delay (0–max) added to the *first* sweep so several engines
    /// started together don't sweep in lockstep.
    pub initial_jitter: Duration,
    /// A sweep taking longer than this logs a warning.
    pub slow_sweep_warn: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            initial_jitter: Duration::from_millis(500),
            slow_sweep_warn: Duration::from_millis(50),
        }
    }
}

impl SweepConfig {
    /// Shortest allowed non-zero interval.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(100);

    /// A config sweeping every `interval`, with default jitter.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamp out-of-range values so the config is safe to use.
    ///
    /// Called automatically by [`SweepScheduler::new`]. Rules:
    /// - a non-zero `interval` below [`Self::MIN_INTERVAL`] is raised to it
    /// - `initial_jitter` is capped at `interval`
    pub fn validated(mut self) -> Self {
        if !self.interval.is_zero() && self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_millis() as u64,
                min_ms = Self::MIN_INTERVAL.as_millis() as u64,
                "sweep interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        if self.initial_jitter > self.interval {
            self.initial_jitter = self.interval;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Sweep info
// ---------------------------------------------------------------------------

/// Returned by [`SweepScheduler::wait_for_sweep`] each time a sweep is due.
#[derive(Debug, Clone)]
pub struct SweepInfo {
    /// Sweep number, starting at 1.
    pub sweep: u64,
    /// How late the scheduler woke up.
    pub late_by: Duration,
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Running totals, updated by [`SweepScheduler::record_sweep`].
#[derive(Debug, Clone, Default)]
pub struct SweepMetrics {
    pub total_sweeps: u64,
    /// Sessions expired across all sweeps.
    pub total_expired: u64,
    /// Sessions expired by the most recent sweep.
    pub last_expired: usize,
    pub max_sweep_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fires a sweep every `interval`.
///
/// Missed sweeps are never replayed: after a late wake-up the next sweep
/// is scheduled from now.
pub struct SweepScheduler {
    config: SweepConfig,
    sweep_count: u64,
    /// When the next sweep should fire (Tokio instant for `sleep_until`).
    next_sweep: Option<TokioInstant>,
    /// When the current sweep started. Set by `wait_for_sweep`, consumed
    /// by `record_sweep`.
    sweep_start: Option<Instant>,
    metrics: SweepMetrics,
}

impl SweepScheduler {
    pub fn new(config: SweepConfig) -> Self {
        let config = config.validated();

        let next_sweep = (!config.interval.is_zero()).then(|| {
            let jitter = if config.initial_jitter.is_zero() {
                Duration::ZERO
            } else {
                let us = rand::rng().random_range(0..config.initial_jitter.as_micros() as u64);
                Duration::from_micros(us)
            };
            TokioInstant::now() + config.interval + jitter
        });

        if next_sweep.is_none() {
            debug!("sweep scheduler created disabled");
        } else {
            debug!(interval_s = config.interval.as_secs_f64(), "sweep scheduler created");
        }

        Self {
            config,
            sweep_count: 0,
            next_sweep,
            sweep_start: None,
            metrics: SweepMetrics::default(),
        }
    }

    /// A scheduler sweeping every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self::new(SweepConfig::with_interval(interval))
    }

    /// Wait until the next sweep is due.
    ///
    /// When disabled, this future never resolves.
    pub async fn wait_for_sweep(&mut self) -> SweepInfo {
        let Some(next) = self.next_sweep else {
            std::future::pending::<()>().await;
            unreachable!()
        };

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        let late_by = now.saturating_duration_since(next);
        self.sweep_count += 1;
        self.sweep_start = Some(Instant::now());
        self.next_sweep = Some(now + self.config.interval);

        if late_by > self.config.interval {
            warn!(
                sweep = self.sweep_count,
                late_ms = late_by.as_secs_f64() * 1000.0,
                "sweep fired late, skipping missed sweeps"
            );
        }
        trace!(sweep = self.sweep_count, "sweep due");

        SweepInfo {
            sweep: self.sweep_count,
            late_by,
        }
    }

    /// Record that the current sweep finished after expiring `expired`
    /// sessions.
    pub fn record_sweep(&mut self, expired: usize) {
        let elapsed = self
            .sweep_start
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default();

        if elapsed >= self.config.slow_sweep_warn {
            warn!(
                sweep = self.sweep_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                "slow sweep"
            );
        }
        if expired > 0 {
            debug!(sweep = self.sweep_count, expired, "janitor expired sessions");
        }

        self.metrics.total_sweeps += 1;
        self.metrics.total_expired += expired as u64;
        self.metrics.last_expired = expired;
        if elapsed > self.metrics.max_sweep_time {
            self.metrics.max_sweep_time = elapsed;
        }
    }

    /// Whether sweeping is disabled (interval zero).
    pub fn is_disabled(&self) -> bool {
        self.next_sweep.is_none()
    }

    pub fn sweep_count(&self) -> u64 {
        self.sweep_count
    }

    pub fn metrics(&self) -> &SweepMetrics {
        &self.metrics
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }
}
