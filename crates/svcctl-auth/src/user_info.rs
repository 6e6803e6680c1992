//! Caller identity derived from verified claims

use std::collections::BTreeSet;

use serde::Serialize;

use crate::claims::Claims;
use crate::error::Unauthenticated;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInfo {
    pub issuer: String,
    pub audiences: BTreeSet<String>,
    pub subject_id: String,
    /// Not required by the token format
    pub email: Option<String>,
}

impl UserInfo {
    pub fn from_claims(claims: &Claims) -> Result<Self, Unauthenticated> {
        Ok(Self {
            issuer: claims.issuer()?.to_string(),
            audiences: claims.audiences()?,
            subject_id: claims.subject()?.to_string(),
            email: claims.email().map(str::to_string),
        })
    }
}
