use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::clock::Clock;

/// Interval at which moving averages are updated, in seconds.
const TICK_INTERVAL_SECS: f64 = 5.0;

/// Interval at which moving averages are updated, in nanoseconds.
const TICK_INTERVAL_NANOS: u64 = 5_000_000_000;

/// An exponentially weighted moving average of an event rate.
///
/// The average is updated once per tick of [`TICK_INTERVAL_SECS`] with the number of events
/// counted since the previous tick.
#[derive(Clone, Debug)]
struct Ewma {
    alpha: f64,
    /// Rate in events per second.
    rate: f64,
    uncounted: u64,
    initialized: bool,
}

impl Ewma {
    fn with_minutes(minutes: f64) -> Self {
        Self {
            alpha: 1.0 - (-TICK_INTERVAL_SECS / 60.0 / minutes).exp(),
            rate: 0.0,
            uncounted: 0,
            initialized: false,
        }
    }

    fn update(&mut self, n: u64) {
        self.uncounted += n;
    }

    fn tick(&mut self) {
        let instant_rate = std::mem::take(&mut self.uncounted) as f64 / TICK_INTERVAL_SECS;

        if self.initialized {
            self.rate += self.alpha * (instant_rate - self.rate);
        } else {
            self.rate = instant_rate;
            self.initialized = true;
        }
    }
}

#[derive(Debug)]
struct MeterState {
    last_tick: u64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
}

impl MeterState {
    fn tick_until(&mut self, now: u64) {
        let age = now.saturating_sub(self.last_tick);
        if age < TICK_INTERVAL_NANOS {
            return;
        }

        self.last_tick = now - age % TICK_INTERVAL_NANOS;
        for _ in 0..age / TICK_INTERVAL_NANOS {
            self.m1.tick();
            self.m5.tick();
            self.m15.tick();
        }
    }
}

/// The rates of a [`Meter`] at a point in time.
///
/// All rates are in events per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rates {
    /// Total number of events marked.
    pub count: u64,
    /// One-minute exponentially weighted moving average rate.
    pub m1: f64,
    /// Five-minute exponentially weighted moving average rate.
    pub m5: f64,
    /// Fifteen-minute exponentially weighted moving average rate.
    pub m15: f64,
    /// Mean rate since the meter was created.
    pub mean: f64,
}

/// Measures the rate at which events occur.
#[derive(Debug)]
pub struct Meter {
    clock: Arc<dyn Clock>,
    start: u64,
    count: AtomicU64,
    state: Mutex<MeterState>,
}

impl Meter {
    /// Creates a new meter which measures time with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let start = clock.tick_nanos();

        Self {
            clock,
            start,
            count: AtomicU64::new(0),
            state: Mutex::new(MeterState {
                last_tick: start,
                m1: Ewma::with_minutes(1.0),
                m5: Ewma::with_minutes(5.0),
                m15: Ewma::with_minutes(15.0),
            }),
        }
    }

    /// Marks the occurrence of a single event.
    pub fn mark(&self) {
        self.mark_n(1);
    }

    /// Marks the occurrence of `n` events.
    pub fn mark_n(&self, n: u64) {
        let mut state = self.state.lock();
        state.tick_until(self.clock.tick_nanos());

        self.count.fetch_add(n, Ordering::Relaxed);
        state.m1.update(n);
        state.m5.update(n);
        state.m15.update(n);
    }

    /// Returns the number of events marked so far.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Returns the current rates of this meter.
    pub fn rates(&self) -> Rates {
        let now = self.clock.tick_nanos();
        let mut state = self.state.lock();
        state.tick_until(now);

        let count = self.count();
        let elapsed = now.saturating_sub(self.start);
        let mean = if count == 0 || elapsed == 0 {
            0.0
        } else {
            count as f64 / (elapsed as f64 / 1e9)
        };

        Rates {
            count,
            m1: state.m1.rate,
            m5: state.m5.rate,
            m15: state.m15.rate,
            mean,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::ManualClock;

    use super::*;

    fn meter() -> (Arc<ManualClock>, Meter) {
        let clock = Arc::new(ManualClock::new(0));
        let meter = Meter::new(clock.clone());
        (clock, meter)
    }

    #[test]
    fn test_meter_empty() {
        let (_, meter) = meter();
        assert_eq!(meter.rates(), Rates::default());
    }

    #[test]
    fn test_meter_mean_rate() {
        let (clock, meter) = meter();
        meter.mark_n(10);
        clock.advance(Duration::from_secs(2));

        let rates = meter.rates();
        assert_eq!(rates.count, 10);
        assert_eq!(rates.mean, 5.0);
    }

    #[test]
    fn test_meter_first_tick_initializes_average() {
        let (clock, meter) = meter();
        meter.mark_n(50);
        clock.advance(Duration::from_secs(5));

        // The first tick sets the averages to the instant rate of 50 events per 5 seconds.
        let rates = meter.rates();
        assert_eq!(rates.m1, 10.0);
        assert_eq!(rates.m5, 10.0);
        assert_eq!(rates.m15, 10.0);
    }

    #[test]
    fn test_meter_averages_decay() {
        let (clock, meter) = meter();
        meter.mark_n(50);
        clock.advance(Duration::from_secs(5));
        meter.rates();

        clock.advance(Duration::from_secs(60));
        let rates = meter.rates();

        // After a minute without events, the one-minute average decays faster than the others.
        assert!(rates.m1 < rates.m5);
        assert!(rates.m5 < rates.m15);
        assert!(rates.m15 < 10.0);
        assert!((rates.m1 - 10.0 / std::f64::consts::E).abs() < 1e-9);
    }
}
