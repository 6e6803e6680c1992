//! Authentication errors

use std::error::Error as StdError;

use thiserror::Error;

/// Why a token was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthFailure {
    /// Not a compact JWS, or header/claims are not JSON objects
    Undecodable,
    MissingClaim,
    MalformedClaim,
    Expired,
    NotYetValid,
    UnknownIssuer,
    ProviderNotAllowed,
    AudienceNotAllowed,
    SignatureInvalid,
    NoSuitableKey,
    UnsupportedAlgorithm,
}

impl AuthFailure {
    /// Malformed or incomplete input rather than a rejected identity
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AuthFailure::Undecodable | AuthFailure::MissingClaim | AuthFailure::MalformedClaim
        )
    }
}

/// The token does not prove an allowed caller identity
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct Unauthenticated {
    pub kind: AuthFailure,
    pub reason: String,
    #[source]
    pub cause: Option<Box<dyn StdError + Send + Sync + 'static>>,
}

impl Unauthenticated {
    pub fn new(kind: AuthFailure, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
            cause: None,
        }
    }

    pub fn with_cause(
        kind: AuthFailure,
        reason: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }

    pub fn is_contract_violation(&self) -> bool {
        self.kind.is_contract_violation()
    }
}

/// Key lookup failures reported by a [`crate::KeySupplier`]
#[derive(Debug, Error)]
pub enum KeySupplyError {
    #[error("No keys configured for issuer {0}")]
    UnknownIssuer(String),

    #[error("Invalid JWKS: {0}")]
    InvalidJwks(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
