//! Operation records
//!
//! An [`Operation`] is the accounting record of one API call: identity, time
//! range, labels, log entries and metric values. It is built per call,
//! mutated only by aggregation and treated as immutable once reported.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric_value::MetricValueSet;

/// Whether the backend must see every call for this operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Importance {
    #[default]
    Low,
    High,
}

/// How quota should be enforced for a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuotaMode {
    #[default]
    Normal,
    BestEffort,
    CheckOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotaProperties {
    #[serde(default)]
    pub quota_mode: QuotaMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogSeverity {
    #[default]
    Default,
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
    Alert,
    Emergency,
}

/// Opaque log record carried through aggregation untouched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub severity: LogSeverity,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl LogEntry {
    pub fn new(name: impl Into<String>, timestamp: DateTime<Utc>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            timestamp,
            severity: LogSeverity::default(),
            labels: BTreeMap::new(),
            payload,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumer_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub log_entries: Vec<LogEntry>,
    #[serde(default)]
    pub metric_value_sets: Vec<MetricValueSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quota_properties: Option<QuotaProperties>,
}

impl Operation {
    /// Operation identified by name and consumer, the two fields a check needs
    pub fn new(operation_name: impl Into<String>, consumer_id: impl Into<String>) -> Self {
        Self {
            operation_name: Some(operation_name.into()),
            consumer_id: Some(consumer_id.into()),
            ..Default::default()
        }
    }

    pub fn with_importance(mut self, importance: Importance) -> Self {
        self.importance = importance;
        self
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

    pub fn with_metric_values(mut self, set: MetricValueSet) -> Self {
        self.metric_value_sets.push(set);
        self
    }

    pub fn with_quota_properties(mut self, properties: QuotaProperties) -> Self {
        self.quota_properties = Some(properties);
        self
    }

    pub fn is_important(&self) -> bool {
        self.importance == Importance::High
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let op = Operation::new("ListShelves", "project:demo");
        assert_eq!(op.importance, Importance::Low);
        assert!(!op.is_important());
        assert!(op.labels.is_empty());
        assert!(op.quota_properties.is_none());
    }

    #[test]
    fn test_serde_uses_rfc3339() {
        let start: DateTime<Utc> = "2024-03-01T10:00:00Z".parse().unwrap();
        let op = Operation::new("ListShelves", "project:demo").with_interval(start, start);
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json["start_time"], "2024-03-01T10:00:00Z");
        assert_eq!(json["importance"], "LOW");

        let back: Operation = serde_json::from_value(json).unwrap();
        assert_eq!(back, op);
    }
}
