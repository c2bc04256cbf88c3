//! In-process instruments and the registry the reporter samples from.
//!
//! Applications register named instruments in a [`MetricRegistry`] and update them from any
//! thread. The reporter periodically calls [`MetricRegistry::snapshot`] to read a consistent view
//! of every registered instrument.
//!
//! # Instruments
//!
//! - [`Counter`]: a signed running count that can be incremented and decremented.
//! - [`Gauge`]: an instantaneous reading. Either set explicitly or computed by a function on every
//!   read. A reading of `None` means that no numeric value is available.
//! - [`Meter`]: counts events and tracks their rate as exponentially weighted moving averages over
//!   1, 5 and 15 minutes, as well as the mean rate since creation.
//! - [`Histogram`]: tracks the statistical distribution of values over a sliding window of the
//!   most recent samples.
//! - [`Timer`]: a meter and a histogram of durations combined.
//!
//! # Example
//!
//! ```
//! use hawkular_metrics::MetricRegistry;
//!
//! let registry = MetricRegistry::new();
//! registry.counter("requests").unwrap().inc();
//! registry.histogram("response.size").unwrap().update(512);
//!
//! let snapshot = registry.snapshot();
//! assert_eq!(snapshot.len(), 2);
//! ```

#![warn(missing_docs)]

mod clock;
mod histogram;
mod instrument;
mod meter;
mod registry;

pub use clock::*;
pub use histogram::*;
pub use instrument::*;
pub use meter::*;
pub use registry::*;
