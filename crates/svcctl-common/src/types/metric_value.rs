//! Metric values attached to operations

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::distribution::Distribution;
use super::money::Money;

/// How two values of the same time series combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricKind {
    /// Change over the reporting interval; values accumulate
    #[default]
    Delta,
    /// Instantaneous measurement; newest wins
    Gauge,
    /// Running total; newest wins
    Cumulative,
}

/// Typed payload of a metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    Bool(bool),
    Int64(i64),
    Double(f64),
    String(String),
    Distribution(Distribution),
    Money(Money),
}

impl Value {
    /// Stable name of the value's type
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int64(_) => "int64",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Distribution(_) => "distribution",
            Value::Money(_) => "money",
        }
    }
}

/// A single measurement of one time series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub value: Value,
}

impl MetricValue {
    pub fn new(value: Value) -> Self {
        Self {
            labels: BTreeMap::new(),
            start_time: None,
            end_time: None,
            value,
        }
    }

    pub fn int64(value: i64) -> Self {
        Self::new(Value::Int64(value))
    }

    pub fn double(value: f64) -> Self {
        Self::new(Value::Double(value))
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_interval(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self
    }
}

/// All values reported for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValueSet {
    pub metric_name: String,
    #[serde(default)]
    pub metric_values: Vec<MetricValue>,
}

impl MetricValueSet {
    pub fn new(metric_name: impl Into<String>, metric_values: Vec<MetricValue>) -> Self {
        Self {
            metric_name: metric_name.into(),
            metric_values,
        }
    }
}
