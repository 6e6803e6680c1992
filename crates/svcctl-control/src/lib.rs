//! # svcctl Control
//!
//! Check caching, report aggregation and request fingerprinting.
//!
//! ## Flow
//!
//! ```text
//! Info -> Operation -> sign -> CheckAggregator::check
//!                                  | None: send to backend, then add_response
//!                                  | Some: answer from cache
//! completed calls -> OperationAggregator::add -> as_operation -> Report
//! ```
//!
//! - [`signing`]: stable request fingerprints
//! - [`metric_value`]: value signatures and per-kind merge rules
//! - [`check`]: the check-decision cache and backend response interpretation
//! - [`operation`]: folding operations into one report operation

pub mod check;
pub mod info;
pub mod metric_value;
pub mod metrics;
pub mod operation;
pub mod signing;

pub use check::{convert_response, CheckAggregator, CheckOptions, CheckOutcome};
pub use info::Info;
pub use metric_value::{MergeFn, MergeRules};
pub use metrics::CheckMetrics;
pub use operation::OperationAggregator;
pub use signing::{sign, sign_operation, Signature};
