//! Configuration for the retirement control loop.

use std::time::Duration;

/// Default idle threshold in minutes. Non-positive configured values are
/// coerced back to this.
const DEFAULT_IDLE_MINUTES: i64 = 1;

/// Default sweep cadence. A zero configured interval is coerced back to
/// this; `tokio::time::interval` rejects a zero period.
const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Retirement controller configuration.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Minutes a node may sit idle before it is retired. Values <= 0 are
    /// treated as the default of 1 minute.
    pub idle_minutes: i64,

    /// Fixed cadence of the retention sweep. One evaluation per registered
    /// node per tick.
    pub check_interval: Duration,

    /// Upper bound on the synchronous wait for a control channel to
    /// disconnect during teardown.
    pub disconnect_timeout: Duration,

    /// Number of background reclaim workers.
    pub reclaim_workers: usize,

    /// Capacity of the reclaim job queue.
    pub reclaim_queue_depth: usize,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            idle_minutes: DEFAULT_IDLE_MINUTES,
            check_interval: DEFAULT_CHECK_INTERVAL,
            disconnect_timeout: Duration::from_secs(5),
            reclaim_workers: 2,
            reclaim_queue_depth: 64,
        }
    }
}

impl RetentionConfig {
    /// Create a config with the given idle threshold and default tuning.
    pub fn with_idle_minutes(idle_minutes: i64) -> Self {
        Self {
            idle_minutes,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let idle_minutes = std::env::var("REAPER_IDLE_MINUTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.idle_minutes);

        let check_interval = std::env::var("REAPER_CHECK_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.check_interval);

        let disconnect_timeout = std::env::var("REAPER_DISCONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.disconnect_timeout);

        let reclaim_workers = std::env::var("REAPER_RECLAIM_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.reclaim_workers);

        let reclaim_queue_depth = std::env::var("REAPER_RECLAIM_QUEUE_DEPTH")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.reclaim_queue_depth);

        Self {
            idle_minutes,
            check_interval,
            disconnect_timeout,
            reclaim_workers,
            reclaim_queue_depth,
        }
    }

    /// Sweep cadence, with a zero interval coerced to the default. Like the
    /// idle threshold, this is a liveness knob: a bad value is normalized,
    /// not rejected.
    pub fn sweep_interval(&self) -> Duration {
        if self.check_interval.is_zero() {
            DEFAULT_CHECK_INTERVAL
        } else {
            self.check_interval
        }
    }

    /// Idle threshold as a duration, with non-positive values coerced to the
    /// default. The threshold is a liveness knob, not a correctness one, so a
    /// bad value is normalized rather than rejected.
    pub fn idle_threshold(&self) -> Duration {
        let minutes = if self.idle_minutes < 1 {
            DEFAULT_IDLE_MINUTES
        } else {
            self.idle_minutes
        };
        Duration::from_secs(minutes as u64 * 60)
    }
}
