//! Metric value signing and merge rules
//!
//! Two values with the same signature inside one metric name belong to the
//! same time series and must be merged. How they merge depends on the
//! metric's [`MetricKind`]; the mapping from kind to merge function is a
//! [`MergeRules`] table so deployments can override individual kinds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use svcctl_common::{MergeError, MetricKind, MetricValue, Value};

use crate::signing::{add_labels_to_hash, Signature};

/// Signature over a value's labels, type and (for money) currency
pub fn sign(value: &MetricValue) -> Signature {
    let mut hasher = blake3::Hasher::new();
    update_hash(&mut hasher, value);
    hasher.finalize().into()
}

/// Fold a value's identity into an outer hash
pub(crate) fn update_hash(hasher: &mut blake3::Hasher, value: &MetricValue) {
    add_labels_to_hash(hasher, &value.labels);
    hasher.update(b"\x00");
    hasher.update(value.value.type_name().as_bytes());
    if let Value::Money(money) = &value.value {
        hasher.update(b"\x00");
        hasher.update(money.currency_code.as_bytes());
    }
}

/// Combines a prior value with a newer one of the same time series
pub type MergeFn = fn(&MetricValue, &MetricValue) -> Result<MetricValue, MergeError>;

/// Sum numeric payloads and widen the time interval
pub fn merge_delta(prior: &MetricValue, latest: &MetricValue) -> Result<MetricValue, MergeError> {
    let value = match (&prior.value, &latest.value) {
        (Value::Int64(a), Value::Int64(b)) => {
            Value::Int64(a.checked_add(*b).ok_or(MergeError::Overflow("int64"))?)
        }
        (Value::Double(a), Value::Double(b)) => Value::Double(a + b),
        (Value::Money(a), Value::Money(b)) => Value::Money(a.checked_add(b)?),
        (Value::Distribution(a), Value::Distribution(b)) => Value::Distribution(a.merged(b)?),
        (Value::Bool(_), Value::Bool(_)) | (Value::String(_), Value::String(_)) => {
            return Err(MergeError::NotDeltaMergeable(latest.value.type_name()))
        }
        (a, b) => {
            return Err(MergeError::TypeMismatch {
                prior: a.type_name(),
                latest: b.type_name(),
            })
        }
    };

    Ok(MetricValue {
        labels: latest.labels.clone(),
        start_time: earliest(prior.start_time, latest.start_time),
        end_time: latest_of(prior.end_time, latest.end_time),
        value,
    })
}

/// The newer value replaces the prior one
pub fn keep_latest(_prior: &MetricValue, latest: &MetricValue) -> Result<MetricValue, MergeError> {
    Ok(latest.clone())
}

/// Per-kind merge functions
#[derive(Debug, Clone)]
pub struct MergeRules {
    rules: HashMap<MetricKind, MergeFn>,
}

impl Default for MergeRules {
    fn default() -> Self {
        let mut rules: HashMap<MetricKind, MergeFn> = HashMap::new();
        rules.insert(MetricKind::Delta, merge_delta);
        rules.insert(MetricKind::Gauge, keep_latest);
        rules.insert(MetricKind::Cumulative, keep_latest);
        Self { rules }
    }
}

impl MergeRules {
    /// Override the merge function for one kind
    pub fn with_rule(mut self, kind: MetricKind, merge: MergeFn) -> Self {
        self.rules.insert(kind, merge);
        self
    }

    pub fn merge(
        &self,
        kind: MetricKind,
        prior: &MetricValue,
        latest: &MetricValue,
    ) -> Result<MetricValue, MergeError> {
        if std::mem::discriminant(&prior.value) != std::mem::discriminant(&latest.value) {
            return Err(MergeError::TypeMismatch {
                prior: prior.value.type_name(),
                latest: latest.value.type_name(),
            });
        }
        let merge = self.rules.get(&kind).copied().unwrap_or(keep_latest);
        merge(prior, latest)
    }
}

/// Earlier of two optional instants; a missing side never wins over a present one
pub fn earliest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Later of two optional instants; a missing side never wins over a present one
pub fn latest_of(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}
