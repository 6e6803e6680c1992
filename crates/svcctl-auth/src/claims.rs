//! JWT claim set and the checks applied to it

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::{AuthFailure, Unauthenticated};

/// Claims that every accepted token must carry
pub const REQUIRED_CLAIMS: [&str; 4] = ["aud", "exp", "iss", "sub"];

/// Decoded JWT payload
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    pub fn new(claims: Map<String, Value>) -> Self {
        Self(claims)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn verify_required_claims_exist(&self) -> Result<(), Unauthenticated> {
        for name in REQUIRED_CLAIMS {
            if !self.0.contains_key(name) {
                return Err(Unauthenticated::new(
                    AuthFailure::MissingClaim,
                    format!("Missing \"{}\" claim", name),
                ));
            }
        }
        Ok(())
    }

    /// Reject tokens that expired or are not valid yet at `now`
    pub fn check_time_claims(&self, now: DateTime<Utc>) -> Result<(), Unauthenticated> {
        let now = now.timestamp();

        let expiration = self.integer_claim("exp")?.ok_or_else(|| {
            Unauthenticated::new(AuthFailure::MissingClaim, "Missing \"exp\" claim")
        })?;
        if now >= expiration {
            return Err(Unauthenticated::new(
                AuthFailure::Expired,
                "The auth token has already expired",
            ));
        }

        if let Some(not_before) = self.integer_claim("nbf")? {
            if now < not_before {
                return Err(Unauthenticated::new(
                    AuthFailure::NotYetValid,
                    "Current time is less than the \"nbf\" time",
                ));
            }
        }
        Ok(())
    }

    pub fn issuer(&self) -> Result<&str, Unauthenticated> {
        self.string_claim("iss")
    }

    pub fn subject(&self) -> Result<&str, Unauthenticated> {
        self.string_claim("sub")
    }

    pub fn email(&self) -> Option<&str> {
        self.0.get("email").and_then(Value::as_str)
    }

    /// `aud` as a set; a single string becomes a one-element set
    pub fn audiences(&self) -> Result<BTreeSet<String>, Unauthenticated> {
        let malformed = || {
            Unauthenticated::new(
                AuthFailure::MalformedClaim,
                "Malformed claim: \"aud\" must be a string or an array of strings",
            )
        };
        match self.0.get("aud") {
            Some(Value::String(audience)) => Ok(BTreeSet::from([audience.clone()])),
            Some(Value::Array(audiences)) => audiences
                .iter()
                .map(|a| a.as_str().map(str::to_string).ok_or_else(malformed))
                .collect(),
            Some(_) => Err(malformed()),
            None => Err(Unauthenticated::new(
                AuthFailure::MissingClaim,
                "Missing \"aud\" claim",
            )),
        }
    }

    fn string_claim(&self, name: &str) -> Result<&str, Unauthenticated> {
        match self.0.get(name) {
            Some(Value::String(value)) => Ok(value),
            Some(_) => Err(Unauthenticated::new(
                AuthFailure::MalformedClaim,
                format!("Malformed claim: \"{}\" must be a string", name),
            )),
            None => Err(Unauthenticated::new(
                AuthFailure::MissingClaim,
                format!("Missing \"{}\" claim", name),
            )),
        }
    }

    fn integer_claim(&self, name: &str) -> Result<Option<i64>, Unauthenticated> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => value.as_i64().map(Some).ok_or_else(|| {
                Unauthenticated::new(
                    AuthFailure::MalformedClaim,
                    format!("Malformed claim: \"{}\" must be an integer", name),
                )
            }),
        }
    }
}
