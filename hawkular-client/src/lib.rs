//! HTTP transport for the Hawkular metrics REST API.
//!
//! [`HttpTransport`] implements the reporter's [`Transport`](hawkular_reporter::Transport) with
//! blocking requests against `<uri>/hawkular/metrics`:
//!
//! - Data points are posted to `/<kind>/raw`, where kind is `counters` or `gauges`.
//! - Tags are put to `/<kind>/<name>/tags`.
//!
//! Every request carries the `Hawkular-Tenant` header and, if configured, credentials and custom
//! headers. See [`HttpConfig`].

#![warn(missing_docs)]

mod config;
mod payload;
mod transport;

pub use self::config::*;
pub use self::payload::*;
pub use self::transport::*;
