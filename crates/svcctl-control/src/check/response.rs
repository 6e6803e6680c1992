//! Mapping of backend check errors onto caller-facing outcomes

use svcctl_common::{CheckErrorCode, CheckResponse};

pub const HTTP_OK: u16 = 200;
pub const HTTP_BAD_REQUEST: u16 = 400;
pub const HTTP_FORBIDDEN: u16 = 403;
pub const HTTP_TOO_MANY_REQUESTS: u16 = 429;
pub const HTTP_INTERNAL_SERVER_ERROR: u16 = 500;
pub const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

/// How the caller should answer the API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub status: u16,
    /// Empty when the check passed
    pub message: String,
    /// Backend infrastructure was unavailable; proceed as if the check passed
    pub fail_open: bool,
    /// The failure concerns the supplied API key
    pub api_key_error: bool,
}

impl CheckOutcome {
    fn ok() -> Self {
        Self {
            status: HTTP_OK,
            message: String::new(),
            fail_open: false,
            api_key_error: false,
        }
    }

    /// The call may go ahead
    pub fn is_allowed(&self) -> bool {
        self.status == HTTP_OK || self.fail_open
    }
}

/// Status code and message template for an error code.
///
/// Templates may reference `{project_id}` and `{detail}`.
fn conversion(code: CheckErrorCode) -> (u16, &'static str) {
    use CheckErrorCode::*;
    match code {
        NotFound => (
            HTTP_BAD_REQUEST,
            "Client project not found. Please pass a valid project.",
        ),
        ApiKeyNotFound => (
            HTTP_BAD_REQUEST,
            "API key not found. Please pass a valid API key.",
        ),
        ApiKeyExpired => (
            HTTP_BAD_REQUEST,
            "API key expired. Please renew the API key.",
        ),
        ApiKeyInvalid => (
            HTTP_BAD_REQUEST,
            "API key not valid. Please pass a valid API key.",
        ),
        ProjectInvalid => (
            HTTP_BAD_REQUEST,
            "Client project not valid. Please pass a valid project.",
        ),
        InvalidCredential => (
            HTTP_BAD_REQUEST,
            "Invalid credential: {detail}",
        ),
        ServiceNotActivated => (
            HTTP_FORBIDDEN,
            "{detail} Please enable the project for {project_id}.",
        ),
        PermissionDenied => (HTTP_FORBIDDEN, "Permission denied: {detail}"),
        IpAddressBlocked | RefererBlocked | ClientAppBlocked | ApiTargetBlocked => {
            (HTTP_FORBIDDEN, "{detail}")
        }
        ProjectDeleted => (HTTP_FORBIDDEN, "Project {project_id} has been deleted"),
        VisibilityDenied => (
            HTTP_FORBIDDEN,
            "Project {project_id} has no visibility access to the service",
        ),
        BillingDisabled => (
            HTTP_FORBIDDEN,
            "Project {project_id} has billing disabled. Please enable it.",
        ),
        ResourceExhausted => (HTTP_TOO_MANY_REQUESTS, "Quota check failed: {detail}"),
        NamespaceLookupUnavailable
        | ServiceStatusUnavailable
        | BillingStatusUnavailable
        | QuotaCheckUnavailable
        | CloudResourceManagerBackendUnavailable
        | SecurityPolicyBackendUnavailable => (
            HTTP_SERVICE_UNAVAILABLE,
            "One or more service control backends are unavailable",
        ),
        ErrorCodeUnspecified => (
            HTTP_INTERNAL_SERVER_ERROR,
            "Request blocked due to unsupported block reason {detail}",
        ),
    }
}

/// Interpret a check response; only the first error is considered
pub fn convert_response(response: &CheckResponse, project_id: &str) -> CheckOutcome {
    let Some(error) = response.check_errors.first() else {
        return CheckOutcome::ok();
    };

    let (status, template) = conversion(error.code);
    let message = template
        .replace("{project_id}", project_id)
        .replace("{detail}", &error.detail);

    CheckOutcome {
        status,
        message,
        fail_open: error.code.is_fail_open(),
        api_key_error: matches!(
            error.code,
            CheckErrorCode::ApiKeyNotFound
                | CheckErrorCode::ApiKeyExpired
                | CheckErrorCode::ApiKeyInvalid
        ),
    }
}
