//! Check request and response records

use serde::{Deserialize, Serialize};

use super::operation::Operation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<Operation>,
}

/// Check request addressed to a named service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceCheckRequest {
    pub service_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_request: Option<CheckRequest>,
}

impl ServiceCheckRequest {
    pub fn new(service_name: impl Into<String>, operation: Operation) -> Self {
        Self {
            service_name: service_name.into(),
            check_request: Some(CheckRequest {
                operation: Some(operation),
            }),
        }
    }

    pub fn operation(&self) -> Option<&Operation> {
        self.check_request.as_ref()?.operation.as_ref()
    }
}

/// Error codes the backend may attach to a check response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CheckErrorCode {
    ErrorCodeUnspecified,
    NotFound,
    PermissionDenied,
    ResourceExhausted,
    ServiceNotActivated,
    BillingDisabled,
    ProjectDeleted,
    ProjectInvalid,
    IpAddressBlocked,
    RefererBlocked,
    ClientAppBlocked,
    ApiTargetBlocked,
    ApiKeyInvalid,
    ApiKeyExpired,
    ApiKeyNotFound,
    InvalidCredential,
    VisibilityDenied,
    NamespaceLookupUnavailable,
    ServiceStatusUnavailable,
    BillingStatusUnavailable,
    QuotaCheckUnavailable,
    CloudResourceManagerBackendUnavailable,
    SecurityPolicyBackendUnavailable,
}

impl CheckErrorCode {
    /// Infrastructure-unavailability codes; callers proceed as if the check passed
    pub fn is_fail_open(&self) -> bool {
        matches!(
            self,
            CheckErrorCode::NamespaceLookupUnavailable
                | CheckErrorCode::ServiceStatusUnavailable
                | CheckErrorCode::BillingStatusUnavailable
                | CheckErrorCode::QuotaCheckUnavailable
                | CheckErrorCode::CloudResourceManagerBackendUnavailable
                | CheckErrorCode::SecurityPolicyBackendUnavailable
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckError {
    pub code: CheckErrorCode,
    #[serde(default)]
    pub detail: String,
}

impl CheckError {
    pub fn new(code: CheckErrorCode) -> Self {
        Self {
            code,
            detail: String::new(),
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    #[serde(default)]
    pub operation_id: String,
    #[serde(default)]
    pub check_errors: Vec<CheckError>,
}

impl CheckResponse {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            check_errors: Vec::new(),
        }
    }

    pub fn with_error(mut self, error: CheckError) -> Self {
        self.check_errors.push(error);
        self
    }
}
