//! Configuration for the Hawkular metrics reporter.
//!
//! The configuration is loaded from a `config.yml` file in a config folder. All values are
//! optional. A missing file results in the default configuration.
//!
//! ```yaml
//! logging:
//!   level: info
//! hawkular:
//!   uri: http://localhost:8080
//!   tenant: my-tenant
//! reporter:
//!   prefix: "app."
//!   interval: 30
//!   global_tags:
//!     host: web-1
//!   per_metric_tags:
//!     "/^db\\./":
//!       group: database
//! ```
//!
//! Values can be overridden from the command line or the environment with an
//! [`OverridableConfig`].

#![warn(missing_docs)]

mod config;

pub use self::config::*;
