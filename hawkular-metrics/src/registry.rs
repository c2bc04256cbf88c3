use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::clock::{Clock, SystemClock};
use crate::histogram::{Histogram, Snapshot};
use crate::instrument::{Counter, Gauge, Timer};
use crate::meter::{Meter, Rates};

/// The type of an instrument registered in a [`MetricRegistry`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MetricType {
    /// A [`Counter`].
    Counter,
    /// A [`Gauge`].
    Gauge,
    /// A [`Meter`].
    Meter,
    /// A [`Histogram`].
    Histogram,
    /// A [`Timer`].
    Timer,
}

impl MetricType {
    /// Returns the name of this type.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Meter => "meter",
            MetricType::Histogram => "histogram",
            MetricType::Timer => "timer",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A shared handle to a registered instrument.
#[derive(Clone, Debug)]
pub enum Metric {
    /// A counter.
    Counter(Arc<Counter>),
    /// A gauge.
    Gauge(Arc<Gauge>),
    /// A meter.
    Meter(Arc<Meter>),
    /// A histogram.
    Histogram(Arc<Histogram>),
    /// A timer.
    Timer(Arc<Timer>),
}

impl Metric {
    /// Returns the type of this instrument.
    pub fn ty(&self) -> MetricType {
        match self {
            Self::Counter(_) => MetricType::Counter,
            Self::Gauge(_) => MetricType::Gauge,
            Self::Meter(_) => MetricType::Meter,
            Self::Histogram(_) => MetricType::Histogram,
            Self::Timer(_) => MetricType::Timer,
        }
    }

    /// Reads the current values of this instrument.
    pub fn sample(&self) -> Sample {
        match self {
            Self::Counter(counter) => Sample::Counter(counter.count()),
            Self::Gauge(gauge) => Sample::Gauge(gauge.value()),
            Self::Meter(meter) => Sample::Meter(meter.rates()),
            Self::Histogram(histogram) => Sample::Histogram {
                count: histogram.count(),
                snapshot: histogram.snapshot(),
            },
            Self::Timer(timer) => Sample::Timer {
                rates: timer.rates(),
                snapshot: timer.snapshot(),
            },
        }
    }
}

/// The values of one instrument at the time of a [`RegistrySnapshot`].
#[derive(Clone, Debug, PartialEq)]
pub enum Sample {
    /// The running count of a counter.
    Counter(i64),
    /// The reading of a gauge, or `None` if it has no numeric value.
    Gauge(Option<f64>),
    /// The rates of a meter.
    Meter(Rates),
    /// The count and sample distribution of a histogram.
    Histogram {
        /// Number of values ever recorded.
        count: u64,
        /// Distribution of the retained values.
        snapshot: Snapshot,
    },
    /// The rates and duration distribution of a timer, in nanoseconds.
    Timer {
        /// Rates of recorded operations, including the total count.
        rates: Rates,
        /// Distribution of the retained durations.
        snapshot: Snapshot,
    },
}

impl Sample {
    /// Returns the type of the instrument this sample was read from.
    pub fn ty(&self) -> MetricType {
        match self {
            Self::Counter(_) => MetricType::Counter,
            Self::Gauge(_) => MetricType::Gauge,
            Self::Meter(_) => MetricType::Meter,
            Self::Histogram { .. } => MetricType::Histogram,
            Self::Timer { .. } => MetricType::Timer,
        }
    }
}

/// Values of all instruments in a registry, ordered by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegistrySnapshot {
    entries: Vec<(String, Sample)>,
}

impl RegistrySnapshot {
    /// Creates a snapshot from individual entries.
    ///
    /// Entries are sorted by name.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Sample)>) -> Self {
        let mut entries: Vec<_> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Self { entries }
    }

    /// Returns the number of instruments in this snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no instruments were registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the sample of the instrument with the given name.
    pub fn get(&self, name: &str) -> Option<&Sample> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, sample)| sample)
    }

    /// Iterates over all instrument names and their samples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sample)> {
        self.entries
            .iter()
            .map(|(name, sample)| (name.as_str(), sample))
    }
}

/// An error returned by the [`MetricRegistry`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The name is already taken by an instrument of another type.
    #[error("metric {name:?} is registered as {registered}, not {requested}")]
    TypeMismatch {
        /// The name of the metric.
        name: String,
        /// The type the name is registered with.
        registered: MetricType,
        /// The type that was requested.
        requested: MetricType,
    },
    /// The name is already taken.
    #[error("metric {0:?} is already registered")]
    AlreadyRegistered(String),
}

/// A thread-safe collection of named instruments.
///
/// Instruments are registered and looked up from arbitrary threads. Each name maps to exactly one
/// instrument; requesting an existing name with the same type returns the registered instrument.
#[derive(Debug)]
pub struct MetricRegistry {
    clock: Arc<dyn Clock>,
    metrics: RwLock<BTreeMap<String, Metric>>,
}

macro_rules! get_or_register {
    ($name:ident, $variant:ident, $ty:ty, $doc:literal) => {
        #[doc = $doc]
        ///
        /// Fails if the name is registered with an instrument of another type.
        pub fn $name(&self, name: &str) -> Result<Arc<$ty>, RegistryError> {
            let metric = self.get_or_insert_with(name, MetricType::$variant, |clock| {
                Metric::$variant(Arc::new(<$ty>::from_clock(clock)))
            })?;

            match metric {
                Metric::$variant(instrument) => Ok(instrument),
                other => Err(RegistryError::TypeMismatch {
                    name: name.to_owned(),
                    registered: other.ty(),
                    requested: MetricType::$variant,
                }),
            }
        }
    };
}

/// Construction of instruments within the registry.
trait FromClock {
    fn from_clock(clock: &Arc<dyn Clock>) -> Self;
}

impl FromClock for Counter {
    fn from_clock(_: &Arc<dyn Clock>) -> Self {
        Counter::new()
    }
}

impl FromClock for Gauge {
    fn from_clock(_: &Arc<dyn Clock>) -> Self {
        Gauge::new()
    }
}

impl FromClock for Meter {
    fn from_clock(clock: &Arc<dyn Clock>) -> Self {
        Meter::new(clock.clone())
    }
}

impl FromClock for Histogram {
    fn from_clock(_: &Arc<dyn Clock>) -> Self {
        Histogram::new()
    }
}

impl FromClock for Timer {
    fn from_clock(clock: &Arc<dyn Clock>) -> Self {
        Timer::new(clock.clone())
    }
}

impl MetricRegistry {
    /// Creates an empty registry using the [`SystemClock`].
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock::new()))
    }

    /// Creates an empty registry that passes the given clock to its meters and timers.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            metrics: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the clock of this registry.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    get_or_register!(
        counter,
        Counter,
        Counter,
        "Returns the counter with the given name, registering it if needed."
    );
    get_or_register!(
        gauge,
        Gauge,
        Gauge,
        "Returns the settable gauge with the given name, registering it if needed."
    );
    get_or_register!(
        meter,
        Meter,
        Meter,
        "Returns the meter with the given name, registering it if needed."
    );
    get_or_register!(
        histogram,
        Histogram,
        Histogram,
        "Returns the histogram with the given name, registering it if needed."
    );
    get_or_register!(
        timer,
        Timer,
        Timer,
        "Returns the timer with the given name, registering it if needed."
    );

    /// Registers a gauge that computes its reading with `f`.
    ///
    /// Fails if the name is already registered.
    pub fn gauge_fn<F>(&self, name: &str, f: F) -> Result<Arc<Gauge>, RegistryError>
    where
        F: Fn() -> Option<f64> + Send + Sync + 'static,
    {
        let gauge = Arc::new(Gauge::from_fn(f));
        self.register(name, Metric::Gauge(gauge.clone()))?;
        Ok(gauge)
    }

    /// Registers an instrument under the given name.
    ///
    /// Fails if the name is already registered.
    pub fn register(&self, name: &str, metric: Metric) -> Result<(), RegistryError> {
        let mut metrics = self.metrics.write();
        if metrics.contains_key(name) {
            return Err(RegistryError::AlreadyRegistered(name.to_owned()));
        }

        metrics.insert(name.to_owned(), metric);
        Ok(())
    }

    /// Removes the instrument with the given name.
    ///
    /// Returns `true` if an instrument was removed.
    pub fn remove(&self, name: &str) -> bool {
        self.metrics.write().remove(name).is_some()
    }

    /// Returns the names of all registered instruments in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.metrics.read().keys().cloned().collect()
    }

    /// Returns the number of registered instruments.
    pub fn len(&self) -> usize {
        self.metrics.read().len()
    }

    /// Returns `true` if no instruments are registered.
    pub fn is_empty(&self) -> bool {
        self.metrics.read().is_empty()
    }

    /// Reads the current values of all registered instruments.
    ///
    /// Handles to the instruments are copied while holding the lock, and their values are read
    /// after releasing it. Registrations and removals on other threads never block on reading
    /// instrument values.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let metrics: Vec<(String, Metric)> = self
            .metrics
            .read()
            .iter()
            .map(|(name, metric)| (name.clone(), metric.clone()))
            .collect();

        let entries = metrics
            .into_iter()
            .map(|(name, metric)| (name, metric.sample()))
            .collect();

        RegistrySnapshot { entries }
    }

    fn get_or_insert_with(
        &self,
        name: &str,
        ty: MetricType,
        create: impl FnOnce(&Arc<dyn Clock>) -> Metric,
    ) -> Result<Metric, RegistryError> {
        if let Some(metric) = self.metrics.read().get(name) {
            return Ok(metric.clone());
        }

        let mut metrics = self.metrics.write();
        let metric = metrics
            .entry(name.to_owned())
            .or_insert_with(|| create(&self.clock));

        if metric.ty() != ty {
            return Err(RegistryError::TypeMismatch {
                name: name.to_owned(),
                registered: metric.ty(),
                requested: ty,
            });
        }

        Ok(metric.clone())
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::new()
    }
}
