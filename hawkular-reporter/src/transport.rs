use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::Serialize;

use crate::tags::Tags;

/// Boxed error type returned by transport implementations.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// The kind of a reported series in the remote store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MetricKind {
    /// A monotonic or running count. Values are integral.
    Counter,
    /// An instantaneous reading.
    Gauge,
}

impl MetricKind {
    /// Returns the name of the resource collection of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counters",
            MetricKind::Gauge => "gauges",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The value of a data point.
///
/// Counter series carry integral values and are serialized as JSON integers. Gauge series carry
/// floating point values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DataValue {
    /// An integral count.
    Integer(i64),
    /// A floating point reading.
    Float(f64),
}

impl DataValue {
    /// Returns the value as a floating point number.
    ///
    /// Integers beyond 2^53 lose precision.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Integer(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

impl From<i64> for DataValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// An error returned by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("request failed")]
    Request(#[source] BoxError),
    /// The remote store responded with an unsuccessful status code.
    #[error("unexpected response status {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },
    /// The payload could not be serialized.
    #[error("could not serialize payload")]
    Payload(#[source] BoxError),
}

/// Sends data points and tags to the remote store.
///
/// Calls are synchronous and must return within a bounded time.
pub trait Transport {
    /// Writes one data point per series, all with the same timestamp in milliseconds.
    fn write_data(
        &self,
        kind: MetricKind,
        timestamp: u64,
        records: &BTreeMap<String, DataValue>,
    ) -> Result<(), TransportError>;

    /// Replaces the tags of a series.
    fn write_tags(
        &self,
        kind: MetricKind,
        full_name: &str,
        tags: &Tags,
    ) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_data(
        &self,
        kind: MetricKind,
        timestamp: u64,
        records: &BTreeMap<String, DataValue>,
    ) -> Result<(), TransportError> {
        (**self).write_data(kind, timestamp, records)
    }

    fn write_tags(
        &self,
        kind: MetricKind,
        full_name: &str,
        tags: &Tags,
    ) -> Result<(), TransportError> {
        (**self).write_tags(kind, full_name, tags)
    }
}

#[cfg(test)]
pub use self::recording::*;
