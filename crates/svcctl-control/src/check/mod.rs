//! Check request caching and response interpretation

pub mod aggregator;
pub mod options;
pub mod response;

pub use aggregator::CheckAggregator;
pub use options::CheckOptions;
pub use response::{convert_response, CheckOutcome};
