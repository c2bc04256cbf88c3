//! Flattening and tagging engine of the Hawkular metrics reporter.
//!
//! The reporter converts snapshots of a [`MetricRegistry`](hawkular_metrics::MetricRegistry)
//! into data points for a Hawkular time series store, and attaches tags to every series at most
//! once per tag cache duration.
//!
//! # Reporting Cycle
//!
//! Each cycle of the [`Reporter`] runs these steps:
//!
//!  1. Take a snapshot of all instruments and drop those rejected by the [`MetricFilter`]. If
//!     no instrument remains, the cycle ends.
//!  2. Expand every instrument into records with the [`Flattener`]. Meters, histograms and timers
//!     produce one record per statistic, named with a fixed suffix such as `.5min` or `.99perc`.
//!  3. Group records by kind into batches and resolve tags for series that are not in the
//!     [`TagCache`], see [`assemble`].
//!  4. Send every batch and every tag request through the [`Transport`]. Failed calls are logged
//!     and do not affect the other calls.
//!  5. Evict expired entries from the tag cache.
//!
//! # Naming
//!
//! The full name of a series is the optional prefix, followed by the instrument name and the
//! suffix of the statistic, see [`compose`]. Tag rules always match names without the prefix.
//!
//! # Tags
//!
//! Tags of a series combine global tags, automatic tags of composite instruments, pattern rules,
//! and exact rules by name. See [`TagRules`] for the precedence.
//!
//! # Scheduling
//!
//! [`ReporterService`] runs a reporter periodically on a tokio runtime.

#![warn(missing_docs)]

mod batch;
mod cache;
mod config;
mod filter;
mod flatten;
mod naming;
mod reporter;
mod service;
mod tags;
mod transport;

pub use self::batch::*;
pub use self::cache::*;
pub use self::config::*;
pub use self::filter::*;
pub use self::flatten::*;
pub use self::naming::*;
pub use self::reporter::*;
pub use self::service::*;
pub use self::tags::*;
pub use self::transport::*;
