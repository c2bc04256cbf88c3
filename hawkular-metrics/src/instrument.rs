use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::clock::Clock;
use crate::histogram::{Histogram, Snapshot};
use crate::meter::{Meter, Rates};

/// A signed running count.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the counter by one.
    pub fn inc(&self) {
        self.inc_by(1);
    }

    /// Increments the counter by `n`.
    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    /// Decrements the counter by one.
    pub fn dec(&self) {
        self.dec_by(1);
    }

    /// Decrements the counter by `n`.
    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    /// Returns the current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

type GaugeFn = Box<dyn Fn() -> Option<f64> + Send + Sync>;

enum GaugeSource {
    Settable(Mutex<Option<f64>>),
    Function(GaugeFn),
}

/// An instantaneous reading.
///
/// A gauge either holds the last value set on it, or computes its reading from a function every
/// time it is read. A reading of `None` means that there is no numeric value, for instance
/// because a settable gauge has never been set.
///
/// # Example
///
/// ```
/// use hawkular_metrics::Gauge;
///
/// let gauge = Gauge::from_fn(|| Some(42.0));
/// assert_eq!(gauge.value(), Some(42.0));
/// ```
pub struct Gauge {
    source: GaugeSource,
}

impl Gauge {
    /// Creates a gauge that reports the last value set on it.
    pub fn new() -> Self {
        Self {
            source: GaugeSource::Settable(Mutex::new(None)),
        }
    }

    /// Creates a gauge that calls `f` on every read.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn() -> Option<f64> + Send + Sync + 'static,
    {
        Self {
            source: GaugeSource::Function(Box::new(f)),
        }
    }

    /// Sets the reading of a settable gauge.
    ///
    /// Has no effect on gauges created with [`Gauge::from_fn`].
    pub fn set(&self, value: f64) {
        if let GaugeSource::Settable(ref current) = self.source {
            *current.lock() = Some(value);
        }
    }

    /// Clears the reading of a settable gauge.
    pub fn clear(&self) {
        if let GaugeSource::Settable(ref current) = self.source {
            *current.lock() = None;
        }
    }

    /// Returns the current reading.
    pub fn value(&self) -> Option<f64> {
        match self.source {
            GaugeSource::Settable(ref current) => *current.lock(),
            GaugeSource::Function(ref f) => f(),
        }
    }
}

impl Default for Gauge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Gauge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.source {
            GaugeSource::Settable(_) => "settable",
            GaugeSource::Function(_) => "function",
        };

        f.debug_struct("Gauge").field("source", &kind).finish()
    }
}

/// Measures the rate and the duration distribution of an operation.
///
/// Durations are recorded in nanoseconds.
#[derive(Debug)]
pub struct Timer {
    clock: Arc<dyn Clock>,
    meter: Meter,
    histogram: Histogram,
}

impl Timer {
    /// Creates a timer which measures time with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            meter: Meter::new(clock.clone()),
            histogram: Histogram::new(),
            clock,
        }
    }

    /// Records the duration of one operation.
    pub fn update(&self, duration: Duration) {
        let nanos = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
        self.histogram.update(nanos);
        self.meter.mark();
    }

    /// Starts timing an operation.
    ///
    /// The duration is recorded when the returned context is stopped or dropped.
    pub fn time(&self) -> TimerContext<'_> {
        TimerContext {
            timer: self,
            start: self.clock.tick_nanos(),
            stopped: false,
        }
    }

    /// Runs `f` and records its duration.
    pub fn time_fn<R>(&self, f: impl FnOnce() -> R) -> R {
        let _context = self.time();
        f()
    }

    /// Returns the number of recorded operations.
    pub fn count(&self) -> u64 {
        self.histogram.count()
    }

    /// Returns the current rates of recorded operations.
    pub fn rates(&self) -> Rates {
        self.meter.rates()
    }

    /// Returns a snapshot of recorded durations in nanoseconds.
    pub fn snapshot(&self) -> Snapshot {
        self.histogram.snapshot()
    }
}

/// A running measurement of a [`Timer`].
///
/// Records the elapsed time on [`stop`](Self::stop) or when dropped, whichever happens first.
#[must_use = "the duration is recorded when the context is dropped"]
#[derive(Debug)]
pub struct TimerContext<'a> {
    timer: &'a Timer,
    start: u64,
    stopped: bool,
}

impl TimerContext<'_> {
    /// Records the elapsed time and returns it.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        self.stopped = true;
        let elapsed = self.timer.clock.tick_nanos().saturating_sub(self.start);
        let duration = Duration::from_nanos(elapsed);
        self.timer.update(duration);
        duration
    }
}

impl Drop for TimerContext<'_> {
    fn drop(&mut self) {
        if !self.stopped {
            self.record();
        }
    }
}
