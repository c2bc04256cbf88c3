use std::fmt;
use std::str::FromStr;

use hawkular_metrics::{Rates, Sample, Snapshot};

use crate::naming::compose;
use crate::transport::{DataValue, MetricKind};

/// An instrument that is reported as several series.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CompositeKind {
    /// Count and rates.
    Meter,
    /// Count and distribution statistics.
    Histogram,
    /// Count, rates and distribution statistics of durations.
    Timer,
}

impl CompositeKind {
    /// Returns the name of this kind, also used as the key of automatic tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Meter => "meter",
            Self::Histogram => "histogram",
            Self::Timer => "timer",
        }
    }

    /// Returns all sub-metric suffixes of this kind in reporting order.
    pub fn suffixes(&self) -> Vec<&'static str> {
        let mut suffixes = vec![COUNT_SUFFIX];

        if matches!(self, Self::Meter | Self::Timer) {
            suffixes.extend(METERED.iter().map(|c| c.suffix));
        }

        if matches!(self, Self::Histogram | Self::Timer) {
            suffixes.extend(SAMPLING.iter().map(|c| c.suffix));
        }

        suffixes
    }

    /// Returns the kind of the series with the given suffix, if this kind reports it.
    pub fn kind_of(&self, suffix: &str) -> Option<MetricKind> {
        if suffix == COUNT_SUFFIX {
            Some(MetricKind::Counter)
        } else if self.suffixes().contains(&suffix) {
            Some(MetricKind::Gauge)
        } else {
            None
        }
    }
}

impl fmt::Display for CompositeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown [`CompositeKind`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown instrument kind {0:?}, expected meter, histogram or timer")]
pub struct ParseCompositeKindError(String);

impl FromStr for CompositeKind {
    type Err = ParseCompositeKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "meter" => Ok(Self::Meter),
            "histogram" => Ok(Self::Histogram),
            "timer" => Ok(Self::Timer),
            other => Err(ParseCompositeKindError(other.to_owned())),
        }
    }
}

/// Identifies one series of a composite instrument.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct SubMetric {
    /// The kind of the instrument.
    pub composite: CompositeKind,
    /// The suffix of the series.
    pub suffix: &'static str,
}

impl SubMetric {
    /// Returns the automatic tag of this series, such as `("meter", "5min")`.
    pub fn auto_tag(&self) -> (&'static str, &'static str) {
        (self.composite.as_str(), self.suffix)
    }
}

/// A single data point of one series, produced by a reporting cycle.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    /// The name of the series, including prefix and suffix.
    pub full_name: String,
    /// The kind of the series.
    pub kind: MetricKind,
    /// The value of the data point. Integral for counter series.
    pub value: DataValue,
    /// The time of the data point in milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// The name of the instrument this record was produced from, without prefix.
    pub base_name: String,
    /// The sub-metric of a composite instrument, if any.
    pub sub_metric: Option<SubMetric>,
}

/// One derived series of a composite instrument.
struct Component<T> {
    suffix: &'static str,
    extract: fn(&T) -> f64,
}

const COUNT_SUFFIX: &str = "count";

static METERED: [Component<Rates>; 4] = [
    Component {
        suffix: "1min",
        extract: |r| r.m1,
    },
    Component {
        suffix: "5min",
        extract: |r| r.m5,
    },
    Component {
        suffix: "15min",
        extract: |r| r.m15,
    },
    Component {
        suffix: "mean",
        extract: |r| r.mean,
    },
];

static SAMPLING: [Component<Snapshot>; 10] = [
    Component {
        suffix: "min",
        extract: |s| s.min() as f64,
    },
    Component {
        suffix: "max",
        extract: |s| s.max() as f64,
    },
    Component {
        suffix: "mean",
        extract: Snapshot::mean,
    },
    Component {
        suffix: "median",
        extract: Snapshot::median,
    },
    Component {
        suffix: "stddev",
        extract: Snapshot::std_dev,
    },
    Component {
        suffix: "75perc",
        extract: Snapshot::p75,
    },
    Component {
        suffix: "95perc",
        extract: Snapshot::p95,
    },
    Component {
        suffix: "98perc",
        extract: Snapshot::p98,
    },
    Component {
        suffix: "99perc",
        extract: Snapshot::p99,
    },
    Component {
        suffix: "999perc",
        extract: Snapshot::p999,
    },
];

/// Expands instrument samples into records.
///
/// Counters and gauges produce a single record named after the instrument. Meters, histograms
/// and timers produce one record per sub-metric.
#[derive(Clone, Debug)]
pub struct Flattener<'a> {
    prefix: Option<&'a str>,
    timestamp: u64,
    rate_factor: f64,
    duration_divisor: f64,
}

impl<'a> Flattener<'a> {
    /// Creates a flattener that stamps all records with `timestamp`.
    ///
    /// Rates are reported per second and durations in nanoseconds.
    pub fn new(prefix: Option<&'a str>, timestamp: u64) -> Self {
        Self {
            prefix,
            timestamp,
            rate_factor: 1.0,
            duration_divisor: 1.0,
        }
    }

    /// Sets the factor that rates per second are multiplied with.
    pub fn rate_factor(mut self, factor: f64) -> Self {
        self.rate_factor = factor;
        self
    }

    /// Sets the number of nanoseconds per reported unit of timer durations.
    pub fn duration_divisor(mut self, divisor: f64) -> Self {
        self.duration_divisor = divisor;
        self
    }

    /// Appends the records of one instrument to `records`.
    ///
    /// Gauge readings that are missing or not finite are skipped.
    pub fn flatten(&self, base_name: &str, sample: &Sample, records: &mut Vec<MetricRecord>) {
        match sample {
            Sample::Counter(count) => {
                records.push(self.simple(base_name, MetricKind::Counter, (*count).into()));
            }
            Sample::Gauge(Some(value)) if value.is_finite() => {
                records.push(self.simple(base_name, MetricKind::Gauge, (*value).into()));
            }
            Sample::Gauge(value) => {
                hawkular_log::trace!(
                    metric = base_name,
                    ?value,
                    "skipping gauge without finite value"
                );
            }
            Sample::Meter(rates) => {
                let composite = CompositeKind::Meter;
                records.push(self.count(base_name, composite, rates.count));
                self.metered(base_name, composite, rates, records);
            }
            Sample::Histogram { count, snapshot } => {
                let composite = CompositeKind::Histogram;
                records.push(self.count(base_name, composite, *count));
                self.sampling(base_name, composite, snapshot, 1.0, records);
            }
            Sample::Timer { rates, snapshot } => {
                let composite = CompositeKind::Timer;
                records.push(self.count(base_name, composite, rates.count));
                self.metered(base_name, composite, rates, records);
                self.sampling(base_name, composite, snapshot, self.duration_divisor, records);
            }
        }
    }

    fn simple(&self, base_name: &str, kind: MetricKind, value: DataValue) -> MetricRecord {
        MetricRecord {
            full_name: compose(self.prefix, base_name, None),
            kind,
            value,
            timestamp: self.timestamp,
            base_name: base_name.to_owned(),
            sub_metric: None,
        }
    }

    fn derived(
        &self,
        base_name: &str,
        composite: CompositeKind,
        suffix: &'static str,
        kind: MetricKind,
        value: DataValue,
    ) -> MetricRecord {
        MetricRecord {
            full_name: compose(self.prefix, base_name, Some(suffix)),
            kind,
            value,
            timestamp: self.timestamp,
            base_name: base_name.to_owned(),
            sub_metric: Some(SubMetric { composite, suffix }),
        }
    }

    fn count(&self, base_name: &str, composite: CompositeKind, count: u64) -> MetricRecord {
        let count = i64::try_from(count).unwrap_or(i64::MAX);
        self.derived(
            base_name,
            composite,
            COUNT_SUFFIX,
            MetricKind::Counter,
            DataValue::Integer(count),
        )
    }

    fn metered(
        &self,
        base_name: &str,
        composite: CompositeKind,
        rates: &Rates,
        records: &mut Vec<MetricRecord>,
    ) {
        records.extend(METERED.iter().map(|component| {
            let value = (component.extract)(rates) * self.rate_factor;
            self.derived(base_name, composite, component.suffix, MetricKind::Gauge, value.into())
        }));
    }

    fn sampling(
        &self,
        base_name: &str,
        composite: CompositeKind,
        snapshot: &Snapshot,
        divisor: f64,
        records: &mut Vec<MetricRecord>,
    ) {
        records.extend(SAMPLING.iter().map(|component| {
            let value = (component.extract)(snapshot) / divisor;
            self.derived(base_name, composite, component.suffix, MetricKind::Gauge, value.into())
        }));
    }
}
