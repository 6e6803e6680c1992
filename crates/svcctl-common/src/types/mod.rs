//! Control-plane records exchanged with the service controller

pub mod check;
pub mod distribution;
pub mod metric_value;
pub mod money;
pub mod operation;
