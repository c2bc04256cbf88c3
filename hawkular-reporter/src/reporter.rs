use std::error::Error;
use std::sync::Arc;

use hawkular_metrics::{Clock, RegistrySnapshot};

use crate::batch::{self, Assembly};
use crate::cache::TagCache;
use crate::config::ReporterConfig;
use crate::filter::MetricFilter;
use crate::flatten::Flattener;
use crate::tags::TagRules;
use crate::transport::Transport;

/// Summary of one reporting cycle.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CycleReport {
    /// Number of records produced from the snapshot.
    pub records: usize,
    /// Number of data batches sent successfully.
    pub batches_sent: usize,
    /// Number of tag requests sent successfully.
    pub tags_sent: usize,
    /// Number of failed transport calls.
    pub failures: usize,
}

/// Converts registry snapshots into transport calls.
///
/// The reporter owns the tag cache, so tags for a series are sent at most once until the cache
/// entry expires. A reporter must not run two cycles at the same time; wrap it in a mutex to
/// share it across threads.
#[derive(Debug)]
pub struct Reporter<T> {
    prefix: Option<String>,
    tags_cache_duration: u64,
    rate_factor: f64,
    duration_divisor: f64,
    filter: MetricFilter,
    rules: TagRules,
    cache: TagCache,
    clock: Arc<dyn Clock>,
    transport: T,
}

impl<T: Transport> Reporter<T> {
    /// Creates a reporter with the tag rules and the filter from the configuration.
    ///
    /// Invalid tag and filter patterns are logged and skipped.
    pub fn new(config: &ReporterConfig, transport: T, clock: Arc<dyn Clock>) -> Self {
        Self::with_rules(config, TagRules::from_config(config), transport, clock)
    }

    /// Creates a reporter with explicit tag rules.
    ///
    /// Tag rules in the configuration are ignored. The filter is still built from the
    /// configuration.
    pub fn with_rules(
        config: &ReporterConfig,
        rules: TagRules,
        transport: T,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            prefix: config.prefix.clone(),
            tags_cache_duration: config.tags_cache_duration,
            rate_factor: config.rate_factor(),
            duration_divisor: config.duration_divisor(),
            filter: MetricFilter::from_config(&config.filter),
            rules,
            cache: TagCache::new(),
            clock,
            transport,
        }
    }

    /// Returns the filter that selects reported instruments.
    pub fn filter(&self) -> &MetricFilter {
        &self.filter
    }

    /// Returns the filter for modification.
    pub fn filter_mut(&mut self) -> &mut MetricFilter {
        &mut self.filter
    }

    /// Returns the tag rules.
    pub fn rules(&self) -> &TagRules {
        &self.rules
    }

    /// Returns the tag rules for modification.
    ///
    /// Changes apply to series that are not in the tag cache.
    pub fn rules_mut(&mut self) -> &mut TagRules {
        &mut self.rules
    }

    /// Returns the tag cache.
    pub fn cache(&self) -> &TagCache {
        &self.cache
    }

    /// Returns the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Runs one reporting cycle over the given snapshot.
    ///
    /// Failed transport calls are logged and do not prevent the remaining calls. A snapshot without
    /// instruments that pass the filter results in no transport calls at all.
    pub fn report(&mut self, snapshot: &RegistrySnapshot) -> CycleReport {
        let selected: Vec<_> = snapshot
            .iter()
            .filter(|(name, _)| self.filter.matches(name))
            .collect();

        if selected.is_empty() {
            hawkular_log::trace!(
                instruments = snapshot.len(),
                "skipping reporting cycle without selected instruments"
            );
            return CycleReport::default();
        }
        let filtered = snapshot.len() - selected.len();

        let now = self.clock.now_millis();
        let flattener = Flattener::new(self.prefix.as_deref(), now)
            .rate_factor(self.rate_factor)
            .duration_divisor(self.duration_divisor);

        let mut records = Vec::new();
        for (name, sample) in selected {
            flattener.flatten(name, sample, &mut records);
        }
        hawkular_log::trace!(
            instruments = snapshot.len(),
            filtered,
            records = records.len(),
            "flattened snapshot"
        );

        let mut report = CycleReport {
            records: records.len(),
            ..Default::default()
        };

        let assembly = batch::assemble(records, &self.rules, &mut self.cache, now);
        hawkular_log::trace!(
            batches = assembly.batches.len(),
            tag_requests = assembly.tag_requests.len(),
            "assembled transport calls"
        );

        self.send(&assembly, &mut report);

        let evicted = self.cache.evict(now, self.tags_cache_duration);
        hawkular_log::trace!(evicted, cached = self.cache.len(), "evicted tag cache");

        hawkular_log::debug!(
            records = report.records,
            batches = report.batches_sent,
            tags = report.tags_sent,
            failures = report.failures,
            "reporting cycle complete"
        );

        report
    }

    fn send(&self, assembly: &Assembly, report: &mut CycleReport) {
        for batch in &assembly.batches {
            let result = self
                .transport
                .write_data(batch.kind, batch.timestamp, &batch.records);

            match result {
                Ok(()) => report.batches_sent += 1,
                Err(error) => {
                    report.failures += 1;
                    hawkular_log::error!(
                        error = &error as &dyn Error,
                        kind = batch.kind.as_str(),
                        size = batch.records.len(),
                        "could not send metrics"
                    );
                }
            }
        }

        for request in &assembly.tag_requests {
            let result = self
                .transport
                .write_tags(request.kind, &request.full_name, &request.tags);

            match result {
                Ok(()) => report.tags_sent += 1,
                Err(error) => {
                    report.failures += 1;
                    hawkular_log::error!(
                        error = &error as &dyn Error,
                        metric = request.full_name.as_str(),
                        "could not tag metric"
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use hawkular_metrics::{ManualClock, MetricRegistry};
    use similar_asserts::assert_eq;

    use crate::config::FilterConfig;
    use crate::tags::Tags;
    use crate::transport::{DataValue, MetricKind, RecordingTransport, TagCall};

    use super::*;

    struct Fixture {
        clock: Arc<ManualClock>,
        registry: MetricRegistry,
        transport: RecordingTransport,
        reporter: Reporter<RecordingTransport>,
    }

    impl Fixture {
        fn new(config: ReporterConfig) -> Self {
            hawkular_log::init_test!();

            let clock = Arc::new(ManualClock::new(1_000_000));
            let registry = MetricRegistry::with_clock(clock.clone());
            let transport = RecordingTransport::new();
            let reporter = Reporter::new(&config, transport.clone(), clock.clone());

            Self {
                clock,
                registry,
                transport,
                reporter,
            }
        }

        fn report(&mut self) -> CycleReport {
            let snapshot = self.registry.snapshot();
            self.reporter.report(&snapshot)
        }

        fn tag_paths(&self) -> Vec<String> {
            self.transport.tag_calls().iter().map(TagCall::path).collect()
        }
    }

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn test_report_counter() {
        let mut fixture = Fixture::new(ReporterConfig::default());
        fixture.registry.counter("my.counter").unwrap().inc();

        let report = fixture.report();

        let batch = fixture.transport.single_data_call(MetricKind::Counter).unwrap();
        let expected = BTreeMap::from([("my.counter".to_owned(), DataValue::Integer(1))]);
        assert_eq!(batch.records, expected);
        assert_eq!(batch.timestamp, 1_000_000);
        assert!(fixture.transport.single_data_call(MetricKind::Gauge).is_none());
        assert!(fixture.transport.tag_calls().is_empty());

        assert_eq!(
            report,
            CycleReport {
                records: 1,
                batches_sent: 1,
                tags_sent: 0,
                failures: 0,
            }
        );
    }

    #[test]
    fn test_report_global_and_exact_tags() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("global-tag", "abc")]),
            per_metric_tags: BTreeMap::from([(
                "my.second.counter".to_owned(),
                tags(&[("metric-tag", "def")]),
            )]),
            ..Default::default()
        });

        fixture.registry.counter("my.first.counter").unwrap().inc();
        fixture.registry.counter("my.second.counter").unwrap().inc();
        fixture.report();

        let batch = fixture.transport.single_data_call(MetricKind::Counter).unwrap();
        assert_eq!(
            batch.records,
            BTreeMap::from([
                ("my.first.counter".to_owned(), DataValue::Integer(1)),
                ("my.second.counter".to_owned(), DataValue::Integer(1)),
            ])
        );

        let calls: Vec<_> = fixture
            .transport
            .tag_calls()
            .into_iter()
            .map(|call| (call.path(), call.tags))
            .collect();

        assert_eq!(
            calls,
            vec![
                (
                    "/counters/my.first.counter/tags".to_owned(),
                    tags(&[("global-tag", "abc")])
                ),
                (
                    "/counters/my.second.counter/tags".to_owned(),
                    tags(&[("global-tag", "abc"), ("metric-tag", "def")])
                ),
            ]
        );
    }

    #[test]
    fn test_report_histogram() {
        let mut fixture = Fixture::new(ReporterConfig::default());
        let histogram = fixture.registry.histogram("my.histogram").unwrap();
        for value in [3, 8, 7, 1, 8, 4] {
            histogram.update(value);
        }

        fixture.report();

        let counters = fixture.transport.single_data_call(MetricKind::Counter).unwrap();
        assert_eq!(
            counters.records,
            BTreeMap::from([("my.histogram.count".to_owned(), DataValue::Integer(6))])
        );

        let gauges = fixture.transport.single_data_call(MetricKind::Gauge).unwrap();
        let truncated: BTreeMap<_, _> = gauges
            .records
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_f64() as i64))
            .collect();

        insta::assert_debug_snapshot!(truncated, @r#"
        {
            "my.histogram.75perc": 8,
            "my.histogram.95perc": 8,
            "my.histogram.98perc": 8,
            "my.histogram.999perc": 8,
            "my.histogram.99perc": 8,
            "my.histogram.max": 8,
            "my.histogram.mean": 5,
            "my.histogram.median": 7,
            "my.histogram.min": 1,
            "my.histogram.stddev": 2,
        }
        "#);

        let tag_calls = fixture.transport.tag_calls();
        assert_eq!(tag_calls.len(), 11);
        for call in &tag_calls {
            let suffix = call.full_name.trim_start_matches("my.histogram.");
            assert_eq!(call.tags, tags(&[("histogram", suffix)]));
        }

        assert_eq!(tag_calls[0].path(), "/counters/my.histogram.count/tags");
        assert_eq!(tag_calls[1].path(), "/gauges/my.histogram.min/tags");
    }

    #[test]
    fn test_report_prefixed_gauge() {
        let mut fixture = Fixture::new(ReporterConfig {
            prefix: Some("prefix-".to_owned()),
            ..Default::default()
        });

        fixture.reporter.rules_mut().set_global_tags(tags(&[("k", "v")]));
        fixture.registry.gauge("my.gauge").unwrap().set(2.5);
        fixture.report();

        let gauges = fixture.transport.single_data_call(MetricKind::Gauge).unwrap();
        assert_eq!(
            gauges.records,
            BTreeMap::from([("prefix-my.gauge".to_owned(), DataValue::Float(2.5))])
        );
        assert!(!gauges.records.contains_key("my.gauge"));
        assert_eq!(fixture.tag_paths(), vec!["/gauges/prefix-my.gauge/tags"]);
        assert!(fixture.reporter.cache().is_fresh("prefix-my.gauge"));
        assert!(!fixture.reporter.cache().is_fresh("my.gauge"));
    }

    #[test]
    fn test_report_prefix_ignored_for_exact_rules() {
        let mut fixture = Fixture::new(ReporterConfig {
            prefix: Some("prefix-".to_owned()),
            per_metric_tags: BTreeMap::from([
                ("my.gauge".to_owned(), tags(&[("found", "base")])),
                ("prefix-my.gauge".to_owned(), tags(&[("found", "full")])),
            ]),
            ..Default::default()
        });

        fixture.registry.gauge("my.gauge").unwrap().set(1.0);
        fixture.report();

        let calls = fixture.transport.tag_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].tags, tags(&[("found", "base")]));
    }

    #[test]
    fn test_report_skips_non_finite_gauges() {
        let mut fixture = Fixture::new(ReporterConfig::default());
        fixture.registry.gauge("finite").unwrap().set(4.0);
        fixture.registry.gauge("nan").unwrap().set(f64::NAN);
        fixture.registry.gauge("inf").unwrap().set(f64::INFINITY);
        fixture.registry.gauge("unset").unwrap();

        let report = fixture.report();

        let gauges = fixture.transport.single_data_call(MetricKind::Gauge).unwrap();
        assert_eq!(
            gauges.records,
            BTreeMap::from([("finite".to_owned(), DataValue::Float(4.0))])
        );
        assert_eq!(report.records, 1);
    }

    #[test]
    fn test_report_empty_registry() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            ..Default::default()
        });

        let report = fixture.report();

        assert_eq!(report, CycleReport::default());
        assert!(fixture.transport.data_calls().is_empty());
        assert!(fixture.transport.tag_calls().is_empty());
    }

    #[test]
    fn test_report_filtered_instruments() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            filter: FilterConfig {
                include: vec!["^app\\.".to_owned()],
                exclude: vec!["\\.debug$".to_owned()],
            },
            ..Default::default()
        });
        fixture.registry.counter("app.requests").unwrap().inc();
        fixture.registry.counter("app.requests.debug").unwrap().inc();
        fixture.registry.gauge("jvm.heap").unwrap().set(1.0);

        let report = fixture.report();

        assert_eq!(report.records, 1);
        assert_eq!(fixture.transport.data_calls().len(), 1);
        let batch = fixture.transport.single_data_call(MetricKind::Counter).unwrap();
        let expected = BTreeMap::from([("app.requests".to_owned(), DataValue::Integer(1))]);
        assert_eq!(batch.records, expected);
        assert_eq!(fixture.tag_paths(), vec!["/counters/app.requests/tags"]);
    }

    #[test]
    fn test_report_all_instruments_filtered() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            filter: FilterConfig {
                include: vec![],
                exclude: vec![".*".to_owned()],
            },
            ..Default::default()
        });
        fixture.registry.counter("c").unwrap().inc();
        fixture.registry.gauge("g").unwrap().set(1.0);

        let report = fixture.report();

        assert_eq!(report, CycleReport::default());
        assert!(fixture.transport.data_calls().is_empty());
        assert!(fixture.transport.tag_calls().is_empty());
    }

    #[test]
    fn test_filter_changes_apply_next_cycle() {
        let mut fixture = Fixture::new(ReporterConfig::default());
        fixture.registry.counter("a").unwrap().inc();
        fixture.registry.counter("b").unwrap().inc();

        fixture.reporter.filter_mut().exclude("^a$").unwrap();
        fixture.report();

        let batch = fixture.transport.single_data_call(MetricKind::Counter).unwrap();
        let names: Vec<_> = batch.records.keys().cloned().collect();
        assert_eq!(names, vec!["b".to_owned()]);
        assert!(!fixture.reporter.filter().matches("a"));
    }

    #[test]
    fn test_report_all_gauges_invalid() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            ..Default::default()
        });
        fixture.registry.gauge("nan").unwrap().set(f64::NAN);

        fixture.report();

        assert!(fixture.transport.data_calls().is_empty());
        assert!(fixture.transport.tag_calls().is_empty());
    }

    #[test]
    fn test_tags_sent_once_within_ttl() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            tags_cache_duration: 10_000,
            ..Default::default()
        });
        fixture.registry.counter("c").unwrap().inc();

        // Tagged in the first cycle, then reported every second without retagging.
        fixture.report();
        for _ in 0..10 {
            fixture.clock.advance(Duration::from_secs(1));
            fixture.report();
        }

        assert_eq!(fixture.transport.data_calls().len(), 11);
        assert_eq!(fixture.tag_paths(), vec!["/counters/c/tags"]);

        // At 11 seconds the entry is older than the TTL and evicted at the end of the cycle.
        fixture.clock.advance(Duration::from_secs(1));
        fixture.report();
        assert_eq!(fixture.transport.tag_calls().len(), 1);
        assert!(fixture.reporter.cache().is_empty());

        fixture.clock.advance(Duration::from_secs(1));
        fixture.report();
        assert_eq!(fixture.transport.tag_calls().len(), 2);
    }

    #[test]
    fn test_empty_tag_set_cached() {
        let mut fixture = Fixture::new(ReporterConfig::default());
        fixture.registry.counter("c").unwrap().inc();
        fixture.report();

        // Rules added after the first cycle only apply once the entry expires.
        fixture.reporter.rules_mut().set_global_tags(tags(&[("late", "rule")]));
        fixture.clock.advance(Duration::from_secs(1));
        fixture.report();
        assert!(fixture.transport.tag_calls().is_empty());

        fixture.clock.advance(Duration::from_secs(601));
        fixture.report();
        fixture.report();
        assert_eq!(fixture.tag_paths(), vec!["/counters/c/tags"]);
    }

    #[test]
    fn test_failures_do_not_abort_cycle() {
        let mut fixture = Fixture::new(ReporterConfig {
            global_tags: tags(&[("k", "v")]),
            tags_cache_duration: 0,
            ..Default::default()
        });
        fixture.transport.fail_data(MetricKind::Counter);
        fixture.transport.fail_tags("a");

        fixture.registry.counter("a").unwrap().inc();
        fixture.registry.counter("b").unwrap().inc();
        fixture.registry.gauge("g").unwrap().set(1.0);

        let report = fixture.report();

        assert_eq!(
            report,
            CycleReport {
                records: 3,
                batches_sent: 1,
                tags_sent: 2,
                failures: 2,
            }
        );
        assert_eq!(fixture.transport.data_calls().len(), 2);
        assert_eq!(
            fixture.tag_paths(),
            vec!["/counters/a/tags", "/counters/b/tags", "/gauges/g/tags"]
        );

        // A failed tag call is not retried before the entry expires.
        assert!(fixture.reporter.cache().is_fresh("a"));
    }

    #[test]
    fn test_meter_auto_tags_disabled() {
        let mut fixture = Fixture::new(ReporterConfig {
            auto_tagging: false,
            ..Default::default()
        });
        fixture.registry.meter("m").unwrap().mark();

        fixture.report();

        assert!(fixture.transport.tag_calls().is_empty());
        let gauges = fixture.transport.single_data_call(MetricKind::Gauge).unwrap();
        let names: Vec<_> = gauges.records.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["m.15min", "m.1min", "m.5min", "m.mean"]);
    }

    #[test]
    fn test_timer_durations_in_milliseconds() {
        let mut fixture = Fixture::new(ReporterConfig {
            auto_tagging: false,
            ..Default::default()
        });

        let timer = fixture.registry.timer("t").unwrap();
        timer.update(Duration::from_millis(250));
        fixture.report();

        let gauges = fixture.transport.single_data_call(MetricKind::Gauge).unwrap();
        assert_eq!(gauges.records["t.max"], DataValue::Float(250.0));
        assert_eq!(gauges.records["t.median"], DataValue::Float(250.0));
    }
}
