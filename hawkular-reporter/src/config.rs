use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::tags::Tags;

/// A unit of time used to scale reported rates and durations.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    /// Nanoseconds.
    Nanoseconds,
    /// Microseconds.
    Microseconds,
    /// Milliseconds.
    Milliseconds,
    /// Seconds.
    Seconds,
    /// Minutes.
    Minutes,
    /// Hours.
    Hours,
    /// Days.
    Days,
}

impl TimeUnit {
    /// Returns the length of one unit in nanoseconds.
    pub fn as_nanos(self) -> f64 {
        match self {
            Self::Nanoseconds => 1.0,
            Self::Microseconds => 1e3,
            Self::Milliseconds => 1e6,
            Self::Seconds => 1e9,
            Self::Minutes => 60e9,
            Self::Hours => 3_600e9,
            Self::Days => 86_400e9,
        }
    }

    /// Returns the length of one unit in seconds.
    pub fn as_secs(self) -> f64 {
        self.as_nanos() / 1e9
    }
}

/// Tags applied to every series whose name matches a pattern.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct PatternTagConfig {
    /// A regular expression, matched anywhere within the name.
    pub pattern: String,
    /// Tags added to matching series.
    pub tags: Tags,
}

/// Selects the instruments that are reported by name.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Regular expressions of instrument names to report.
    ///
    /// If empty, all instruments are reported unless excluded.
    pub include: Vec<String>,

    /// Regular expressions of instrument names never to report. Takes precedence over `include`.
    pub exclude: Vec<String>,
}

/// Controls naming, tagging and scheduling of the reporter.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReporterConfig {
    /// A string prepended to every reported series name.
    ///
    /// The prefix is not part of the name used to look up tags. Defaults to `None`.
    pub prefix: Option<String>,

    /// Time between two reporting cycles in seconds.
    ///
    /// Defaults to `60` seconds.
    pub interval: u64,

    /// Tags applied to every series.
    pub global_tags: Tags,

    /// Tags applied to series by name.
    ///
    /// Keys are either literal base names, or regular expressions wrapped in slashes such as
    /// `"/^jvm\\./"`, which apply to every matching series.
    pub per_metric_tags: BTreeMap<String, Tags>,

    /// Tags applied to every series matching a pattern, in order.
    pub pattern_tags: Vec<PatternTagConfig>,

    /// Minimum time in milliseconds before tags are sent again for the same series.
    ///
    /// Defaults to `600000` (10 minutes).
    pub tags_cache_duration: u64,

    /// Adds a tag naming the instrument type and statistic to every series of meters, histograms
    /// and timers, such as `"timer": "99perc"`.
    ///
    /// Defaults to `true`.
    pub auto_tagging: bool,

    /// The unit of time that rates are reported in.
    ///
    /// Defaults to `seconds`, so rates are reported as events per second.
    pub rate_unit: TimeUnit,

    /// The unit that timer durations are reported in.
    ///
    /// Defaults to `milliseconds`.
    pub duration_unit: TimeUnit,

    /// Selects the reported instruments. Defaults to all instruments.
    pub filter: FilterConfig,

    /// Records the duration of reporting cycles and failed calls as `hawkular.reporter.*`
    /// instruments in the reported registry.
    ///
    /// Defaults to `false`.
    pub self_metrics: bool,

    /// Reports the seconds since the reporter process started as the `process.uptime` gauge.
    ///
    /// Defaults to `false`.
    pub process_metrics: bool,
}

impl ReporterConfig {
    /// Returns the time between two reporting cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// Returns the factor converting rates per second into rates per
    /// [`rate_unit`](Self::rate_unit).
    pub fn rate_factor(&self) -> f64 {
        self.rate_unit.as_secs()
    }

    /// Returns the number of nanoseconds in one [`duration_unit`](Self::duration_unit).
    pub fn duration_divisor(&self) -> f64 {
        self.duration_unit.as_nanos()
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            prefix: None,
            interval: 60,
            global_tags: Tags::new(),
            per_metric_tags: BTreeMap::new(),
            pattern_tags: Vec::new(),
            tags_cache_duration: 10 * 60 * 1000, // 10 minutes
            auto_tagging: true,
            rate_unit: TimeUnit::Seconds,
            duration_unit: TimeUnit::Milliseconds,
            filter: FilterConfig::default(),
            self_metrics: false,
            process_metrics: false,
        }
    }
}
