//! The Hawkular reporter binary.
//!
//! Periodically samples the process' metric registry, flattens every instrument into named
//! series and writes them to a Hawkular metrics server. Tags of a series are written once per
//! cache lifetime.
//!
//! # Workspace Crates
//!
//!  - `hawkular`: Main entry point and command line interface.
//!  - [`hawkular-client`]: HTTP transport for the Hawkular REST API.
//!  - [`hawkular-config`]: Static configuration for the CLI and reporter.
//!  - [`hawkular-log`]: Logging setup and facade.
//!  - [`hawkular-metrics`]: In-process instruments and the metric registry.
//!  - [`hawkular-reporter`]: Flattening, tagging and periodic reporting.
//!
//! [`hawkular-client`]: ../hawkular_client/index.html
//! [`hawkular-config`]: ../hawkular_config/index.html
//! [`hawkular-log`]: ../hawkular_log/index.html
//! [`hawkular-metrics`]: ../hawkular_metrics/index.html
//! [`hawkular-reporter`]: ../hawkular_reporter/index.html

mod cli;
mod cliapp;
mod setup;

use std::process;

pub fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(err) => {
            hawkular_log::ensure_error(&err);
            1
        }
    };

    process::exit(exit_code);
}
