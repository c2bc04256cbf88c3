use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime};

/// A source of wall clock time and monotonic ticks.
///
/// Wall clock time stamps data points. Ticks measure elapsed time for meters and timers and must
/// never go backwards.
pub trait Clock: fmt::Debug + Send + Sync {
    /// Returns the current time in milliseconds since the UNIX epoch.
    fn now_millis(&self) -> u64;

    /// Returns a monotonic tick in nanoseconds, relative to an arbitrary origin.
    fn tick_nanos(&self) -> u64;
}

/// The [`Clock`] backed by the operating system.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock with its tick origin at the current instant.
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
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn tick_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// A [`Clock`] that only moves when told to.
///
/// Wall clock time and ticks advance together. Intended for tests of time dependent behavior,
/// such as rate computation or tag expiry.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use hawkular_metrics::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(5));
/// assert_eq!(clock.now_millis(), 6_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicU64,
    nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at the given wall clock time.
    pub fn new(now_millis: u64) -> Self {
        Self {
            millis: AtomicU64::new(now_millis),
            nanos: AtomicU64::new(0),
        }
    }

    /// Moves both the wall clock and the ticks forward.
    pub fn advance(&self, duration: Duration) {
        self.millis
            .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        self.nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }

    fn tick_nanos(&self) -> u64 {
        self.nanos.load(Ordering::SeqCst)
    }
}
