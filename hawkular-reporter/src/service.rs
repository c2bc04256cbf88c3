use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use hawkular_metrics::{Counter, MetricRegistry, Timer};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::reporter::{CycleReport, Reporter};
use crate::transport::Transport;

/// Name of the timer measuring the duration of reporting cycles.
pub const CYCLE_TIMER: &str = "hawkular.reporter.cycle";

/// Name of the counter of failed transport calls.
pub const FAILURE_COUNTER: &str = "hawkular.reporter.failures";

/// Shortest supported interval between reporting cycles.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Instruments the service records about itself.
#[derive(Clone, Debug)]
struct SelfMetrics {
    cycle: Arc<Timer>,
    failures: Arc<Counter>,
}

impl SelfMetrics {
    fn register(registry: &MetricRegistry) -> Option<Self> {
        let result = registry
            .timer(CYCLE_TIMER)
            .and_then(|cycle| Ok((cycle, registry.counter(FAILURE_COUNTER)?)));

        match result {
            Ok((cycle, failures)) => Some(Self { cycle, failures }),
            Err(error) => {
                hawkular_log::warn!(
                    error = &error as &dyn Error,
                    "reporter metrics are not recorded"
                );
                None
            }
        }
    }
}

/// Periodically reports a registry.
///
/// Every `interval`, the service takes a snapshot of the registry and runs a reporting cycle on
/// the blocking thread pool. The first cycle runs one interval after the start. Cycles never
/// overlap; if a cycle takes longer than the interval, the missed ticks are skipped.
///
/// The service does not add instruments to the reported registry. Use
/// [`with_self_metrics`](Self::with_self_metrics) to record its own timings.
///
/// # Example
///
/// ```no_run
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// use hawkular_metrics::MetricRegistry;
/// use hawkular_reporter::{DataValue, MetricKind, Reporter, ReporterConfig, ReporterService, Tags};
/// use hawkular_reporter::{Transport, TransportError};
///
/// struct Discard;
///
/// impl Transport for Discard {
///     fn write_data(
///         &self,
///         _: MetricKind,
///         _: u64,
///         _: &BTreeMap<String, DataValue>,
///     ) -> Result<(), TransportError> {
///         Ok(())
///     }
///
///     fn write_tags(&self, _: MetricKind, _: &str, _: &Tags) -> Result<(), TransportError> {
///         Ok(())
///     }
/// }
///
/// # async fn example() {
/// let registry = Arc::new(MetricRegistry::new());
/// let config = ReporterConfig::default();
/// let reporter = Reporter::new(&config, Discard, registry.clock().clone());
///
/// let handle = ReporterService::new(reporter, registry, config.interval()).start();
/// handle.shutdown().await;
/// # }
/// ```
#[derive(Debug)]
pub struct ReporterService<T> {
    reporter: Arc<Mutex<Reporter<T>>>,
    registry: Arc<MetricRegistry>,
    interval: Duration,
    metrics: Option<SelfMetrics>,
}

impl<T> ReporterService<T>
where
    T: Transport + Send + 'static,
{
    /// Creates a service reporting `registry` every `interval`.
    pub fn new(reporter: Reporter<T>, registry: Arc<MetricRegistry>, interval: Duration) -> Self {
        Self {
            reporter: Arc::new(Mutex::new(reporter)),
            registry,
            interval: interval.max(MIN_INTERVAL),
            metrics: None,
        }
    }

    /// Records the duration of every cycle and the number of failed transport calls.
    ///
    /// The [`CYCLE_TIMER`] and [`FAILURE_COUNTER`] instruments are registered in `metrics`. If
    /// this is the reported registry, the instruments are reported along with all others.
    pub fn with_self_metrics(mut self, metrics: &MetricRegistry) -> Self {
        self.metrics = SelfMetrics::register(metrics);
        self
    }

    /// Spawns the service onto the current tokio runtime.
    pub fn start(self) -> ReporterHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join_handle = tokio::spawn(self.run(shutdown_rx));

        ReporterHandle {
            shutdown_tx,
            join_handle,
        }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        hawkular_log::info!(interval = ?self.interval, "metrics reporter started");

        loop {
            tokio::select! {
                biased;

                // Also stops when the handle is dropped.
                _ = shutdown_rx.changed() => break,
                _ = ticker.tick() => self.run_cycle().await,
            }
        }

        hawkular_log::debug!("running final reporting cycle");
        self.run_cycle().await;

        // Blocking transports must not be dropped on an async worker.
        let Self { reporter, .. } = self;
        let _ = tokio::task::spawn_blocking(move || drop(reporter)).await;

        hawkular_log::info!("metrics reporter stopped");
    }

    async fn run_cycle(&self) {
        let reporter = self.reporter.clone();
        let registry = self.registry.clone();
        let metrics = self.metrics.clone();

        let result = tokio::task::spawn_blocking(move || {
            let _timer = metrics.as_ref().map(|m| m.cycle.time());
            let snapshot = registry.snapshot();
            let report = reporter.lock().report(&snapshot);

            if let Some(ref metrics) = metrics {
                metrics.failures.inc_by(report.failures as i64);
            }

            report
        })
        .await;

        match result {
            Ok(CycleReport { failures: 0, .. }) => (),
            Ok(report) => hawkular_log::warn!(
                failures = report.failures,
                "reporting cycle completed with failures"
            ),
            Err(error) => hawkular_log::error!(
                error = &error as &dyn Error,
                "reporting cycle panicked"
            ),
        }
    }
}

/// Controls a running [`ReporterService`].
///
/// Dropping the handle stops the service after a final reporting cycle, without waiting for it.
#[derive(Debug)]
pub struct ReporterHandle {
    shutdown_tx: watch::Sender<bool>,
    join_handle: JoinHandle<()>,
}

impl ReporterHandle {
    /// Stops the service and waits for the final reporting cycle to complete.
    pub async fn shutdown(self) {
        self.shutdown_tx.send_replace(true);

        if let Err(error) = self.join_handle.await {
            hawkular_log::error!(
                error = &error as &dyn Error,
                "metrics reporter terminated unexpectedly"
            );
        }
    }
}
