use std::collections::BTreeMap;

use crate::cache::TagCache;
use crate::flatten::MetricRecord;
use crate::tags::{TagRules, Tags};
use crate::transport::{DataValue, MetricKind};

/// Data points of one kind sent in a single transport call.
#[derive(Clone, Debug, PartialEq)]
pub struct ReportBatch {
    /// The kind of all series in this batch.
    pub kind: MetricKind,
    /// The timestamp of all data points in milliseconds.
    pub timestamp: u64,
    /// Values by full series name.
    pub records: BTreeMap<String, DataValue>,
}

/// Tags to send for a series.
#[derive(Clone, Debug, PartialEq)]
pub struct TagRequest {
    /// The kind of the series.
    pub kind: MetricKind,
    /// The full name of the series.
    pub full_name: String,
    /// The resolved tags, never empty.
    pub tags: Tags,
}

/// The transport calls of one reporting cycle.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Assembly {
    /// Non-empty batches, counters before gauges.
    pub batches: Vec<ReportBatch>,
    /// Tag requests in the order their series were first seen.
    pub tag_requests: Vec<TagRequest>,
}

/// Groups records into batches and decides which series need tags.
///
/// A series that is not fresh in the cache has its tags resolved and is marked as tagged at
/// `now`, even if it resolves to no tags. A request is only created for non-empty tags. Records
/// sharing a full name produce at most one tag request; within a batch, the last record wins.
pub fn assemble(
    records: Vec<MetricRecord>,
    rules: &TagRules,
    cache: &mut TagCache,
    now: u64,
) -> Assembly {
    let mut batches = BTreeMap::<(MetricKind, u64), BTreeMap<String, DataValue>>::new();
    let mut tag_requests = Vec::new();

    for record in records {
        if !cache.is_fresh(&record.full_name) {
            let tags = rules.resolve(
                &record.base_name,
                record.sub_metric.map(|s| s.suffix),
                record.sub_metric.map(|s| s.auto_tag()),
            );

            cache.mark_tagged(&record.full_name, now);

            if !tags.is_empty() {
                tag_requests.push(TagRequest {
                    kind: record.kind,
                    full_name: record.full_name.clone(),
                    tags,
                });
            }
        }

        batches
            .entry((record.kind, record.timestamp))
            .or_default()
            .insert(record.full_name, record.value);
    }

    let batches = batches
        .into_iter()
        .map(|((kind, timestamp), records)| ReportBatch {
            kind,
            timestamp,
            records,
        })
        .collect();

    Assembly {
        batches,
        tag_requests,
    }
}

#[cfg(test)]
mod tests {
    use hawkular_metrics::{Rates, Sample};
    use similar_asserts::assert_eq;

    use crate::flatten::Flattener;

    use super::*;

    fn records(samples: &[(&str, Sample)]) -> Vec<MetricRecord> {
        let flattener = Flattener::new(None, 500);
        let mut records = Vec::new();
        for (name, sample) in samples {
            flattener.flatten(name, sample, &mut records);
        }
        records
    }

    #[test]
    fn test_batches_grouped_by_kind() {
        let records = records(&[
            ("b.gauge", Sample::Gauge(Some(0.5))),
            ("a.counter", Sample::Counter(2)),
            ("c.counter", Sample::Counter(3)),
        ]);

        let assembly = assemble(records, &TagRules::new(), &mut TagCache::new(), 500);

        assert_eq!(
            assembly.batches,
            vec![
                ReportBatch {
                    kind: MetricKind::Counter,
                    timestamp: 500,
                    records: BTreeMap::from([
                        ("a.counter".to_owned(), DataValue::Integer(2)),
                        ("c.counter".to_owned(), DataValue::Integer(3)),
                    ]),
                },
                ReportBatch {
                    kind: MetricKind::Gauge,
                    timestamp: 500,
                    records: BTreeMap::from([("b.gauge".to_owned(), DataValue::Float(0.5))]),
                },
            ]
        );
        assert!(assembly.tag_requests.is_empty());
    }

    #[test]
    fn test_no_empty_batches() {
        let assembly = assemble(
            records(&[("g", Sample::Gauge(None))]),
            &TagRules::new(),
            &mut TagCache::new(),
            0,
        );

        assert_eq!(assembly, Assembly::default());
    }

    #[test]
    fn test_empty_tags_marked_fresh() {
        let mut cache = TagCache::new();
        let assembly = assemble(
            records(&[("my.counter", Sample::Counter(1))]),
            &TagRules::new(),
            &mut cache,
            0,
        );

        assert!(assembly.tag_requests.is_empty());
        assert!(cache.is_fresh("my.counter"));
    }

    #[test]
    fn test_fresh_series_not_retagged() {
        let mut rules = TagRules::new();
        rules.set_global_tags(Tags::from([("env".to_owned(), "prod".to_owned())]));

        let mut cache = TagCache::new();
        cache.mark_tagged("known", 0);

        let assembly = assemble(
            records(&[("known", Sample::Counter(1)), ("new", Sample::Counter(1))]),
            &rules,
            &mut cache,
            10,
        );

        let names: Vec<_> = assembly
            .tag_requests
            .iter()
            .map(|r| r.full_name.as_str())
            .collect();
        assert_eq!(names, vec!["new"]);
    }

    #[test]
    fn test_shared_full_name_tagged_once() {
        let rules = TagRules::new();

        // The rate mean and the duration mean of a timer share a full name.
        let sample = Sample::Timer {
            rates: Rates {
                mean: 1.0,
                ..Default::default()
            },
            snapshot: hawkular_metrics::Snapshot::new(vec![7]),
        };

        let assembly = assemble(
            records(&[("t", sample)]),
            &rules,
            &mut TagCache::new(),
            0,
        );

        let mean_requests = assembly
            .tag_requests
            .iter()
            .filter(|r| r.full_name == "t.mean")
            .count();
        assert_eq!(mean_requests, 1);
        assert_eq!(assembly.tag_requests.len(), 14);

        let gauges = &assembly.batches[1];
        assert_eq!(gauges.kind, MetricKind::Gauge);
        assert_eq!(gauges.records["t.mean"], DataValue::Float(7.0));
    }
}
