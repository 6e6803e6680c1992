//! Per-call metadata used to build the initial operation

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use svcctl_common::{
    Clock, Importance, Operation, Result, ServiceCheckRequest, ValidationError, LABEL_PREFIX,
    VERSION,
};

/// Value of the `user_agent` label
pub const USER_AGENT: &str = "ESP";

/// Value of the `service_agent` label
pub fn service_agent() -> String {
    format!("SVCCTL_RUST/{}", VERSION)
}

/// Facts about one API call gathered by the request handler.
///
/// Empty strings mean "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    /// SHA-1 signing-certificate fingerprint of the calling Android app
    pub android_cert_fingerprint: String,
    pub android_package_name: String,
    pub api_key: String,
    /// False once the backend has rejected `api_key`
    pub api_key_valid: bool,
    pub client_ip: String,
    pub consumer_project_id: String,
    pub ios_bundle_id: String,
    /// Shared by the check and report calls of one API call
    pub operation_id: String,
    pub operation_name: String,
    /// Referer header, or the origin when absent
    pub referer: String,
    pub service_name: String,
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

impl Info {
    /// Operation stamped with the current time.
    ///
    /// The consumer is the API key when it is valid, else the consumer project.
    pub fn as_operation(&self, clock: &dyn Clock) -> Operation {
        let now = clock.now();
        let consumer_id = if !self.api_key.is_empty() && self.api_key_valid {
            Some(format!("api_key:{}", self.api_key))
        } else {
            non_empty(&self.consumer_project_id).map(|id| format!("project:{}", id))
        };

        Operation {
            operation_id: non_empty(&self.operation_id),
            operation_name: non_empty(&self.operation_name),
            consumer_id,
            start_time: Some(now),
            end_time: Some(now),
            importance: Importance::Low,
            ..Default::default()
        }
    }

    /// Check request for this call
    pub fn as_check_request(&self, clock: &dyn Clock) -> Result<ServiceCheckRequest> {
        if self.service_name.is_empty() {
            return Err(ValidationError::MissingField("service name").into());
        }
        if self.operation_id.is_empty() {
            return Err(ValidationError::MissingField("operation id").into());
        }
        if self.operation_name.is_empty() {
            return Err(ValidationError::MissingField("operation name").into());
        }

        let mut operation = self.as_operation(clock);
        operation.labels = self.check_labels();
        Ok(ServiceCheckRequest::new(self.service_name.clone(), operation))
    }

    fn check_labels(&self) -> BTreeMap<String, String> {
        let mut labels = BTreeMap::new();
        let mut put = |name: &str, value: &str| {
            if !value.is_empty() {
                labels.insert(format!("{}{}", LABEL_PREFIX, name), value.to_string());
            }
        };

        put("android_cert_fingerprint", &self.android_cert_fingerprint);
        put("android_package_name", &self.android_package_name);
        put("ios_bundle_id", &self.ios_bundle_id);
        put("caller_ip", &self.client_ip);
        put("referer", &self.referer);
        put("user_agent", USER_AGENT);
        put("service_agent", &service_agent());
        labels
    }
}
