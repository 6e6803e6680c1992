//! Verification keys and the collaborator that supplies them
//!
//! Keys come from a [`KeySupplier`] per issuer. [`StaticKeySupplier`] holds
//! keys in memory, typically parsed from JWKS documents at startup; remote
//! JWKS fetching belongs to other implementations of the trait.

use std::collections::HashMap;
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::VerifyingKey;
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPublicKey};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::KeySupplyError;
use crate::jws::Algorithm;

#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    Ed25519(VerifyingKey),
    /// Shared secret for HMAC signatures
    Hmac(Vec<u8>),
    Rsa(RsaPublicKey),
    P256(p256::ecdsa::VerifyingKey),
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMaterial::Ed25519(key) => write!(f, "Ed25519({})", hex::encode(&key.as_bytes()[..4])),
            KeyMaterial::Hmac(_) => f.write_str("Hmac(<redacted>)"),
            KeyMaterial::Rsa(key) => write!(f, "Rsa({} bits)", key.size() * 8),
            KeyMaterial::P256(key) => {
                let point = key.to_encoded_point(true);
                write!(f, "P256({})", hex::encode(&point.as_bytes()[..4]))
            }
        }
    }
}

/// A key a token signature may be checked against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationKey {
    pub kid: Option<String>,
    pub material: KeyMaterial,
}

impl VerificationKey {
    pub fn ed25519(kid: Option<String>, key: VerifyingKey) -> Self {
        Self {
            kid,
            material: KeyMaterial::Ed25519(key),
        }
    }

    pub fn hmac(kid: Option<String>, secret: impl Into<Vec<u8>>) -> Self {
        Self {
            kid,
            material: KeyMaterial::Hmac(secret.into()),
        }
    }

    pub fn rsa(kid: Option<String>, key: RsaPublicKey) -> Self {
        Self {
            kid,
            material: KeyMaterial::Rsa(key),
        }
    }

    pub fn p256(kid: Option<String>, key: p256::ecdsa::VerifyingKey) -> Self {
        Self {
            kid,
            material: KeyMaterial::P256(key),
        }
    }

    /// Whether this key can check signatures made with `algorithm`
    pub fn supports(&self, algorithm: Algorithm) -> bool {
        matches!(
            (&self.material, algorithm),
            (KeyMaterial::Ed25519(_), Algorithm::EdDsa)
                | (KeyMaterial::Hmac(_), Algorithm::Hs256)
                | (KeyMaterial::Rsa(_), Algorithm::Rs256)
                | (KeyMaterial::P256(_), Algorithm::Es256)
        )
    }

    /// Parse one JSON Web Key.
    ///
    /// Supports `OKP`/`Ed25519`, `RSA`, `EC`/`P-256` and `oct` keys.
    pub fn from_jwk(jwk: &Value) -> Result<Self, KeySupplyError> {
        let field = |name: &str| jwk.get(name).and_then(Value::as_str);
        let kid = field("kid").map(str::to_string);

        match (field("kty"), field("crv")) {
            (Some("OKP"), Some("Ed25519")) => {
                let x = field("x").ok_or_else(|| invalid("OKP key without \"x\""))?;
                let bytes: [u8; 32] = decode_b64(x)?
                    .try_into()
                    .map_err(|_| invalid("Ed25519 key must be 32 bytes"))?;
                let key = VerifyingKey::from_bytes(&bytes)
                    .map_err(|e| invalid(&format!("bad Ed25519 key: {}", e)))?;
                Ok(Self::ed25519(kid, key))
            }
            (Some("RSA"), _) => {
                let n = field("n").ok_or_else(|| invalid("RSA key without \"n\""))?;
                let e = field("e").ok_or_else(|| invalid("RSA key without \"e\""))?;
                let key = RsaPublicKey::new(
                    BigUint::from_bytes_be(&decode_b64(n)?),
                    BigUint::from_bytes_be(&decode_b64(e)?),
                )
                .map_err(|e| invalid(&format!("bad RSA key: {}", e)))?;
                Ok(Self::rsa(kid, key))
            }
            (Some("EC"), Some("P-256")) => {
                let x = coordinate(field("x"), "x")?;
                let y = coordinate(field("y"), "y")?;
                let point = p256::EncodedPoint::from_affine_coordinates(
                    p256::FieldBytes::from_slice(&x),
                    p256::FieldBytes::from_slice(&y),
                    false,
                );
                let key = p256::ecdsa::VerifyingKey::from_encoded_point(&point)
                    .map_err(|e| invalid(&format!("bad P-256 key: {}", e)))?;
                Ok(Self::p256(kid, key))
            }
            (Some("oct"), _) => {
                let k = field("k").ok_or_else(|| invalid("oct key without \"k\""))?;
                Ok(Self::hmac(kid, decode_b64(k)?))
            }
            (kty, crv) => Err(invalid(&format!(
                "unsupported key type {:?}/{:?}",
                kty.unwrap_or("none"),
                crv.unwrap_or("none")
            ))),
        }
    }
}

fn invalid(reason: &str) -> KeySupplyError {
    KeySupplyError::InvalidJwks(reason.to_string())
}

/// One P-256 affine coordinate, exactly 32 bytes
fn coordinate(text: Option<&str>, name: &str) -> Result<Vec<u8>, KeySupplyError> {
    let text = text.ok_or_else(|| invalid(&format!("EC key without \"{}\"", name)))?;
    let bytes = decode_b64(text)?;
    if bytes.len() != 32 {
        return Err(invalid(&format!("P-256 coordinate \"{}\" must be 32 bytes", name)));
    }
    Ok(bytes)
}

fn decode_b64(text: &str) -> Result<Vec<u8>, KeySupplyError> {
    URL_SAFE_NO_PAD
        .decode(text.trim_end_matches('='))
        .map_err(|e| invalid(&format!("bad base64url: {}", e)))
}

/// Parse a JWKS document (`{"keys": [...]}`), skipping unsupported keys
pub fn parse_jwks(document: &str) -> Result<Vec<VerificationKey>, KeySupplyError> {
    let jwks: Value = serde_json::from_str(document)?;
    let entries = jwks
        .get("keys")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("document has no \"keys\" array"))?;

    let mut keys = Vec::with_capacity(entries.len());
    for entry in entries {
        match VerificationKey::from_jwk(entry) {
            Ok(key) => keys.push(key),
            Err(e) => warn!(error = %e, "Skipping JWK"),
        }
    }
    if keys.is_empty() {
        return Err(invalid("no usable keys"));
    }
    Ok(keys)
}

/// Resolves the current signing keys of an issuer
#[cfg_attr(test, mockall::automock)]
pub trait KeySupplier: Send + Sync {
    fn supply(&self, issuer: &str) -> Result<Vec<VerificationKey>, KeySupplyError>;
}

/// In-memory keys per issuer
#[derive(Debug, Default, Clone)]
pub struct StaticKeySupplier {
    keys: HashMap<String, Vec<VerificationKey>>,
}

impl StaticKeySupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(mut self, issuer: impl Into<String>, keys: Vec<VerificationKey>) -> Self {
        self.keys.entry(issuer.into()).or_default().extend(keys);
        self
    }

    /// Add the keys of a JWKS document for `issuer`
    pub fn with_jwks(self, issuer: impl Into<String>, document: &str) -> Result<Self, KeySupplyError> {
        let issuer = issuer.into();
        let keys = parse_jwks(document)?;
        debug!(%issuer, count = keys.len(), "Loaded JWKS");
        Ok(self.with_keys(issuer, keys))
    }

    pub fn issuers(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }
}

impl KeySupplier for StaticKeySupplier {
    fn supply(&self, issuer: &str) -> Result<Vec<VerificationKey>, KeySupplyError> {
        self.keys
            .get(issuer)
            .cloned()
            .ok_or_else(|| KeySupplyError::UnknownIssuer(issuer.to_string()))
    }
}
