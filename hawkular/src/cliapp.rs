//! This module implements the definition of the command line app.

use clap::builder::ValueParser;
use clap::{Arg, ArgAction, Command};
use hawkular_reporter::CompositeKind;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const ABOUT: &str = "Reports in-process metrics to a Hawkular metrics server.";

pub fn make_app() -> Command {
    Command::new("hawkular")
        .disable_help_subcommand(true)
        .subcommand_required(true)
        .arg_required_else_help(true)
        .propagate_version(true)
        .max_term_width(79)
        .version(VERSION)
        .about(ABOUT)
        .arg(
            Arg::new("config")
                .value_name("CONFIG")
                .long("config")
                .short('c')
                .global(true)
                .env("HAWKULAR_CONFIG")
                .default_value(".hawkular")
                .help("The path to the config folder."),
        )
        .arg(
            Arg::new("log_level")
                .value_name("LEVEL")
                .long("log-level")
                .global(true)
                .env("HAWKULAR_LOG_LEVEL")
                .help("The log level, one of off, error, warn, info, debug or trace."),
        )
        .arg(
            Arg::new("uri")
                .value_name("URI")
                .long("uri")
                .global(true)
                .env("HAWKULAR_URI")
                .help("The base URI of the Hawkular metrics server."),
        )
        .arg(
            Arg::new("tenant")
                .value_name("TENANT")
                .long("tenant")
                .global(true)
                .env("HAWKULAR_TENANT")
                .help("The tenant metrics are reported to."),
        )
        .arg(
            Arg::new("prefix")
                .value_name("PREFIX")
                .long("prefix")
                .global(true)
                .env("HAWKULAR_PREFIX")
                .help("The prefix prepended to all series names."),
        )
        .arg(
            Arg::new("interval")
                .value_name("SECONDS")
                .long("interval")
                .global(true)
                .env("HAWKULAR_INTERVAL")
                .help("The number of seconds between two reporting cycles."),
        )
        .subcommand(
            Command::new("run")
                .about("Run the reporter")
                .after_help(
                    "This reports the metrics of this process in the foreground until it is \
                     shut down with Ctrl-C or SIGTERM.  A final reporting cycle runs before \
                     the process exits.",
                ),
        )
        .subcommand(
            Command::new("config")
                .about("Manage the reporter config")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(
                    Command::new("show")
                        .about("Show the effective config")
                        .after_help(
                            "This dumps out the entire config including the values which \
                             are not in the config file but filled in from defaults, the \
                             environment or the command line.  Secrets are omitted.",
                        ),
                )
                .subcommand(
                    Command::new("check")
                        .about("Validate the config")
                        .after_help(
                            "This loads the config and compiles every tag pattern.  The \
                             command fails if any pattern is invalid.",
                        ),
                ),
        )
        .subcommand(
            Command::new("tags")
                .about("Show the tags of a series")
                .after_help(
                    "This resolves the tags the reporter attaches to a series using the \
                     configured global, pattern and per-metric rules.",
                )
                .arg(
                    Arg::new("name")
                        .value_name("NAME")
                        .required(true)
                        .help("The registry name of the instrument, without prefix."),
                )
                .arg(
                    Arg::new("kind")
                        .value_name("KIND")
                        .long("kind")
                        .short('k')
                        .value_parser(ValueParser::new(str::parse::<CompositeKind>))
                        .requires("suffix")
                        .help("The composite instrument kind: meter, histogram or timer."),
                )
                .arg(
                    Arg::new("suffix")
                        .value_name("SUFFIX")
                        .long("suffix")
                        .short('s')
                        .action(ArgAction::Set)
                        .help("The sub-metric suffix, for example 95perc or 1min."),
                ),
        )
}
