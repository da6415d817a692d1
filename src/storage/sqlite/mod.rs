//! Shared `SQLite` infrastructure for storage backends.
//!
//! - [`connection`]: lock acquisition with poison recovery, pragma setup
//! - [`metrics`]: operation counters and latency histograms

mod connection;
mod metrics;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::{record_operation_metrics, status_label};
