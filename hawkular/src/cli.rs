use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::ArgMatches;
use hawkular_client::HttpTransport;
use hawkular_config::{Config, OverridableConfig};
use hawkular_reporter::{CompositeKind, Reporter, ReporterService, TagRules, compose};

use crate::cliapp::make_app;
use crate::setup;

/// Runs the command line application.
pub fn execute() -> Result<()> {
    let app = make_app();
    let matches = app.get_matches();
    let config_path = matches
        .get_one::<String>("config")
        .map_or(".hawkular", String::as_str);

    let mut config = Config::from_path(config_path)?;
    config.apply_override(extract_config_args(&matches))?;

    hawkular_log::init(config.logging());

    match matches.subcommand() {
        Some(("run", _)) => run(config),
        Some(("config", config_matches)) => manage_config(&config, config_matches),
        Some(("tags", tags_matches)) => show_tags(&config, tags_matches),
        _ => unreachable!(),
    }
}

/// Extracts configuration overrides from the command line and the environment.
pub fn extract_config_args(matches: &ArgMatches) -> OverridableConfig {
    let value = |id: &str| matches.get_one::<String>(id).cloned();

    OverridableConfig {
        uri: value("uri"),
        tenant: value("tenant"),
        prefix: value("prefix"),
        interval: value("interval"),
        log_level: value("log_level"),
    }
}

pub fn manage_config(config: &Config, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => {
            let yaml = config.to_yaml_string()?;
            io::stdout().lock().write_all(yaml.as_bytes())?;
            Ok(())
        }
        Some(("check", _)) => {
            setup::check_config(config)?;
            writeln!(io::stdout().lock(), "config ok")?;
            Ok(())
        }
        _ => unreachable!(),
    }
}

pub fn show_tags(config: &Config, matches: &ArgMatches) -> Result<()> {
    let name = matches
        .get_one::<String>("name")
        .context("missing series name")?;
    let suffix = matches.get_one::<String>("suffix").map(String::as_str);
    let kind = matches.get_one::<CompositeKind>("kind").copied();

    let auto_tag = match (kind, suffix) {
        (Some(kind), Some(suffix)) => {
            if kind.kind_of(suffix).is_none() {
                anyhow::bail!(
                    "a {kind} has no series {suffix:?}, expected one of: {}",
                    kind.suffixes().join(", ")
                );
            }
            Some((kind.as_str(), suffix))
        }
        _ => None,
    };

    let rules = TagRules::from_config(config.reporter());
    let tags = rules.resolve(name, suffix, auto_tag);

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", compose(config.prefix(), name, suffix))?;
    if tags.is_empty() {
        writeln!(stdout, "  no tags")?;
    }
    for (key, value) in &tags {
        writeln!(stdout, "  {key}: {value}")?;
    }

    Ok(())
}

pub fn run(config: Config) -> Result<()> {
    setup::dump_spawn_infos(&config);

    let registry = Arc::new(setup::create_registry(config.reporter())?);

    // The blocking HTTP client must be created outside of the async runtime.
    let transport =
        HttpTransport::new(config.http()).context("failed to create the http transport")?;
    let reporter = Reporter::new(config.reporter(), transport, registry.clock().clone());

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("hawkular-reporter")
        .enable_all()
        .build()
        .context("failed to start the tokio runtime")?;

    runtime.block_on(async move {
        let mut service = ReporterService::new(reporter, registry.clone(), config.interval());
        if config.reporter().self_metrics {
            service = service.with_self_metrics(&registry);
        }
        let handle = service.start();

        let result = wait_for_shutdown().await;
        hawkular_log::info!("shutting down metrics reporter");
        handle.shutdown().await;

        result
    })
}

async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => hawkular_log::info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
