//! # svcctl Common
//!
//! Shared building blocks for the service-control client core.
//!
//! ## Records
//!
//! - [`Operation`]: accounting record of one API call
//! - [`MetricValue`]/[`MetricValueSet`]: typed measurements, keyed by labels
//! - [`Distribution`]/[`Money`]: compound metric payloads
//! - [`ServiceCheckRequest`]/[`CheckResponse`]: check exchange with the backend
//!
//! ## Infrastructure
//!
//! - [`cache::TtlLruCache`]: bounded LRU map with per-entry time-to-live
//! - [`clock`]: wall-clock abstraction with a manual clock for simulations

pub mod cache;
pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use cache::{Lookup, TtlLruCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ControlError, MergeError, Result, ValidationError};
pub use types::{
    check::{CheckError, CheckErrorCode, CheckRequest, CheckResponse, ServiceCheckRequest},
    distribution::{BucketOptions, Distribution},
    metric_value::{MetricKind, MetricValue, MetricValueSet, Value},
    money::Money,
    operation::{Importance, LogEntry, LogSeverity, Operation, QuotaMode, QuotaProperties},
};

/// svcctl version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix shared by service-control label keys
pub const LABEL_PREFIX: &str = "servicecontrol.googleapis.com/";
