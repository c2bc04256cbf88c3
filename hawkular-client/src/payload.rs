use std::collections::BTreeMap;

use hawkular_reporter::DataValue;
use serde::Serialize;

/// A single data point.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DataPoint {
    /// Milliseconds since the UNIX epoch.
    pub timestamp: u64,
    /// The value.
    pub value: DataValue,
}

/// Data points of one series.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricData<'a> {
    /// The full name of the series.
    pub id: &'a str,
    /// The data points of the series.
    pub data_points: Vec<DataPoint>,
}

/// Builds the body of a raw data request, with one data point per series.
///
/// Counter values are serialized as JSON integers and gauge values as JSON floats.
pub fn data_payload(timestamp: u64, records: &BTreeMap<String, DataValue>) -> Vec<MetricData<'_>> {
    records
        .iter()
        .map(|(name, &value)| MetricData {
            id: name,
            data_points: vec![DataPoint { timestamp, value }],
        })
        .collect()
}
