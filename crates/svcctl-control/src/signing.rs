//! Request fingerprinting
//!
//! A check request's signature covers exactly the fields that decide whether
//! two requests may share a cached answer: operation name, consumer id,
//! labels, metric value identities and quota properties. Quantities carried
//! by metric values are not part of it.

use std::collections::BTreeMap;
use std::fmt;

use svcctl_common::{CheckRequest, Operation, QuotaMode, Result, ValidationError};
use tracing::error;

use crate::metric_value;

const SEPARATOR: &[u8] = b"\x00";

/// Stable 32-byte digest used as a cache and de-duplication key
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Signature([u8; 32]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<blake3::Hash> for Signature {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", &self.to_hex()[..16])
    }
}

/// Fold a label map into the hash; `BTreeMap` iteration is already key-sorted
pub(crate) fn add_labels_to_hash(hasher: &mut blake3::Hasher, labels: &BTreeMap<String, String>) {
    for (key, value) in labels {
        hasher.update(key.as_bytes());
        hasher.update(SEPARATOR);
        hasher.update(value.as_bytes());
        hasher.update(SEPARATOR);
    }
}

/// Sign a check request
pub fn sign(request: &CheckRequest) -> Result<Signature> {
    let operation = request.operation.as_ref().ok_or_else(|| {
        error!("Check request has no operation; cannot sign");
        ValidationError::MissingOperation
    })?;
    sign_operation(operation)
}

/// Sign the check-relevant identity of an operation
pub fn sign_operation(operation: &Operation) -> Result<Signature> {
    let name = operation
        .operation_name
        .as_deref()
        .ok_or(ValidationError::MissingOperationField("operation name"))?;
    let consumer = operation
        .consumer_id
        .as_deref()
        .ok_or(ValidationError::MissingOperationField("consumer id"))?;

    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(SEPARATOR);
    hasher.update(consumer.as_bytes());
    add_labels_to_hash(&mut hasher, &operation.labels);

    for value_set in &operation.metric_value_sets {
        hasher.update(SEPARATOR);
        hasher.update(value_set.metric_name.as_bytes());
        for value in &value_set.metric_values {
            metric_value::update_hash(&mut hasher, value);
        }
    }

    hasher.update(SEPARATOR);
    if let Some(properties) = &operation.quota_properties {
        hasher.update(b"quota");
        hasher.update(match properties.quota_mode {
            QuotaMode::Normal => b"\x01",
            QuotaMode::BestEffort => b"\x02",
            QuotaMode::CheckOnly => b"\x03",
        });
    }
    hasher.update(SEPARATOR);

    Ok(hasher.finalize().into())
}
