use std::error::Error;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use hawkular_client::HttpTransport;
use hawkular_config::Config;
use hawkular_metrics::{MetricRegistry, RegistryError};
use hawkular_reporter::{MetricFilter, ReporterConfig, TagRules};

/// The name of the gauge reporting the seconds since the reporter started.
pub const UPTIME_GAUGE: &str = "process.uptime";

/// Validates the connection settings, all tag rules and the filter of the configuration.
pub fn check_config(config: &Config) -> Result<()> {
    HttpTransport::new(config.http()).context("invalid hawkular connection settings")?;

    let tag_errors = TagRules::check_config(config.reporter());
    for error in &tag_errors {
        hawkular_log::error!(error = error as &dyn Error, "invalid tag rule");
    }

    let filter_errors = MetricFilter::check_config(&config.reporter().filter);
    for error in &filter_errors {
        hawkular_log::error!(error = error as &dyn Error, "invalid metric filter");
    }

    if !tag_errors.is_empty() {
        anyhow::bail!("found {} invalid tag pattern(s)", tag_errors.len());
    }

    if !filter_errors.is_empty() {
        anyhow::bail!("found {} invalid filter pattern(s)", filter_errors.len());
    }

    Ok(())
}

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        hawkular_log::info!("launching reporter without config folder");
    } else {
        hawkular_log::info!(
            "launching reporter from config folder {}",
            config.path().display()
        );
    }
    hawkular_log::info!("  server: {}", config.uri());
    hawkular_log::info!("  tenant: {}", config.tenant());
    hawkular_log::info!("  prefix: {}", config.prefix().unwrap_or("-"));
    hawkular_log::info!("  interval: {:?}", config.interval());
    hawkular_log::info!("  log level: {}", config.logging().level);
}

/// Creates the registry reported by the service.
///
/// Process instruments are only registered if enabled in the configuration.
pub fn create_registry(config: &ReporterConfig) -> Result<MetricRegistry, RegistryError> {
    let registry = MetricRegistry::new();
    if config.process_metrics {
        register_process_metrics(&registry)?;
    }
    Ok(registry)
}

/// Registers instruments describing the reporting process itself.
pub fn register_process_metrics(registry: &MetricRegistry) -> Result<(), RegistryError> {
    let started = Arc::new(Instant::now());
    registry.gauge_fn(UPTIME_GAUGE, move || Some(started.elapsed().as_secs_f64()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use hawkular_metrics::Sample;

    use super::*;

    #[test]
    fn test_uptime_gauge() {
        let registry = MetricRegistry::new();
        register_process_metrics(&registry).unwrap();

        let snapshot = registry.snapshot();
        assert!(matches!(
            snapshot.get(UPTIME_GAUGE),
            Some(Sample::Gauge(Some(uptime))) if *uptime >= 0.0
        ));

        assert!(register_process_metrics(&registry).is_err());
    }

    #[test]
    fn test_check_config() {
        let config = Config::from_json_value(serde_json::json!({
            "reporter": {"per_metric_tags": {"/ok\\..*/": {"a": "b"}}}
        }))
        .unwrap();
        assert!(check_config(&config).is_ok());

        let config = Config::from_json_value(serde_json::json!({
            "reporter": {"pattern_tags": [{"pattern": "(open", "tags": {}}]}
        }))
        .unwrap();
        let error = check_config(&config).unwrap_err();
        assert_eq!(error.to_string(), "found 1 invalid tag pattern(s)");
    }

    #[test]
    fn test_check_config_filter() {
        let config = Config::from_json_value(serde_json::json!({
            "reporter": {"filter": {"include": ["^app\\."], "exclude": ["[z-a]", "(open"]}}
        }))
        .unwrap();

        let error = check_config(&config).unwrap_err();
        assert_eq!(error.to_string(), "found 2 invalid filter pattern(s)");
    }

    #[test]
    fn test_registry_without_process_metrics() {
        let registry = create_registry(&ReporterConfig::default()).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_registry_with_process_metrics() {
        let config = ReporterConfig {
            process_metrics: true,
            ..Default::default()
        };

        let registry = create_registry(&config).unwrap();
        assert_eq!(registry.names(), vec![UPTIME_GAUGE.to_owned()]);
    }
}
