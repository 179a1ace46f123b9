use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Monotonic time source. Only differences between readings matter.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`].
#[derive(Debug, Clone)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same reading, so a
/// host can keep one handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    nanos: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, delta: Duration) {
        let delta = u64::try_from(delta.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(delta, Ordering::SeqCst);
    }

    pub fn set(&self, at: Duration) {
        let at = u64::try_from(at.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.store(at, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

/// Derives the playback position from an `(anchor time, offset)` pair instead
/// of asking the output for it.
///
/// The position wraps at the track duration, which reproduces single-track
/// looping without a loop-boundary callback. Samples are handed out at a
/// fixed interval by [`ProgressTicker::poll`]; a late poll yields one sample
/// and realigns to the interval grid rather than replaying missed ticks.
#[derive(Debug, Clone)]
pub struct ProgressTicker {
    anchor: Duration,
    offset: f64,
    duration: f64,
    interval: Duration,
    next_due: Duration,
    looped: bool,
}

impl ProgressTicker {
    /// Anchors a ticker at `now`, with playback sitting at `offset` seconds.
    pub fn start(now: Duration, offset: f64, duration: f64, interval: Duration) -> Self {
        Self {
            anchor: now,
            offset: offset.max(0.0),
            duration: duration.max(0.0),
            interval,
            next_due: now + interval,
            looped: true,
        }
    }

    /// Non-looped tickers stop at the duration instead of wrapping.
    pub fn with_looping(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Exact position at `now`, independent of the sampling grid.
    pub fn position_at(&self, now: Duration) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }

        let elapsed = now.saturating_sub(self.anchor).as_secs_f64();
        if self.looped {
            (self.offset + elapsed).rem_euclid(self.duration)
        } else {
            (self.offset + elapsed).min(self.duration)
        }
    }

    /// Whether a non-looped track has played to its end by `now`.
    pub fn is_finished(&self, now: Duration) -> bool {
        if self.looped {
            return false;
        }
        let elapsed = now.saturating_sub(self.anchor).as_secs_f64();
        self.offset + elapsed >= self.duration
    }

    /// Returns a fresh position sample if a tick is due at `now`.
    pub fn poll(&mut self, now: Duration) -> Option<f64> {
        if now < self.next_due {
            return None;
        }

        let interval = self.interval.as_nanos();
        self.next_due = if interval == 0 {
            now
        } else {
            let behind = (now - self.next_due).as_nanos();
            let into_slot = Duration::from_nanos((behind % interval) as u64);
            now + self.interval - into_slot
        };

        Some(self.position_at(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const TICK: Duration = Duration::from_millis(250);

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_secs(3));
        assert_eq!(clock.now(), Duration::from_secs(3));

        clock.set(Duration::from_millis(10));
        assert_eq!(handle.now(), Duration::from_millis(10));
    }

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock::new();
        let first = clock.now();
        assert!(clock.now() >= first);
    }

    #[test]
    fn position_starts_at_offset_and_advances() {
        let start = Duration::from_secs(100);
        let ticker = ProgressTicker::start(start, 30.0, 120.0, TICK);

        assert!((ticker.position_at(start) - 30.0).abs() < 1e-9);
        assert!((ticker.position_at(start + Duration::from_secs(5)) - 35.0).abs() < 1e-9);
    }

    #[test]
    fn position_wraps_at_duration() {
        let ticker = ProgressTicker::start(Duration::ZERO, 110.0, 120.0, TICK);
        let position = ticker.position_at(Duration::from_secs(15));
        assert!((position - 5.0).abs() < 1e-9);
    }

    #[test]
    fn unlooped_position_stops_at_duration() {
        let ticker = ProgressTicker::start(Duration::ZERO, 110.0, 120.0, TICK).with_looping(false);
        assert!(!ticker.is_finished(Duration::from_secs(5)));
        assert_eq!(ticker.position_at(Duration::from_secs(15)), 120.0);
        assert!(ticker.is_finished(Duration::from_secs(15)));
    }

    #[test]
    fn zero_duration_reports_zero() {
        let ticker = ProgressTicker::start(Duration::ZERO, 3.0, 0.0, TICK);
        assert_eq!(ticker.position_at(Duration::from_secs(9)), 0.0);
    }

    #[test]
    fn polls_once_per_interval() {
        let mut ticker = ProgressTicker::start(Duration::ZERO, 0.0, 60.0, TICK);

        assert!(ticker.poll(Duration::from_millis(100)).is_none());
        assert!(ticker.poll(Duration::from_millis(250)).is_some());
        assert!(ticker.poll(Duration::from_millis(300)).is_none());
        assert!(ticker.poll(Duration::from_millis(500)).is_some());
    }

    #[test]
    fn late_poll_does_not_burst() {
        let mut ticker = ProgressTicker::start(Duration::ZERO, 0.0, 60.0, TICK);

        let sample = ticker.poll(Duration::from_millis(1_100)).unwrap();
        assert!((sample - 1.1).abs() < 1e-9);
        assert!(ticker.poll(Duration::from_millis(1_200)).is_none());
        assert!(ticker.poll(Duration::from_millis(1_250)).is_some());
    }

    proptest! {
        #[test]
        fn progress_is_monotonic_within_a_loop_period(
            offset in 0.0f64..120.0,
            steps in prop::collection::vec(1u64..2_000, 1..40),
        ) {
            let duration = 120.0;
            let ticker = ProgressTicker::start(Duration::ZERO, offset, duration, TICK);

            let mut now = Duration::ZERO;
            let mut previous = ticker.position_at(now);
            let mut unwrapped_previous = offset;
            for step in steps {
                now += Duration::from_millis(step);
                let position = ticker.position_at(now);
                let unwrapped = offset + now.as_secs_f64();
                prop_assert!(position >= 0.0 && position < duration);
                if (unwrapped / duration).floor() == (unwrapped_previous / duration).floor() {
                    prop_assert!(position >= previous);
                }
                previous = position;
                unwrapped_previous = unwrapped;
            }
        }
    }
}
