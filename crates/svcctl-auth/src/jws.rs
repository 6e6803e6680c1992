//! Compact JWS decoding and signature verification

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ed25519_dalek::{Signature, Verifier};
use rsa::Pkcs1v15Sign;
use serde::Deserialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::claims::Claims;
use crate::error::{AuthFailure, Unauthenticated};
use crate::keys::{KeyMaterial, VerificationKey};

/// Signature algorithms accepted in the `alg` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    EdDsa,
    Hs256,
    /// RSASSA-PKCS1-v1_5 with SHA-256
    Rs256,
    /// ECDSA on P-256 with SHA-256
    Es256,
}

impl Algorithm {
    pub fn parse(alg: &str) -> Result<Self, Unauthenticated> {
        match alg {
            "EdDSA" => Ok(Algorithm::EdDsa),
            "HS256" => Ok(Algorithm::Hs256),
            "RS256" => Ok(Algorithm::Rs256),
            "ES256" => Ok(Algorithm::Es256),
            other => Err(Unauthenticated::new(
                AuthFailure::UnsupportedAlgorithm,
                format!("Unsupported signing algorithm: {}", other),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// A decoded but not yet verified token
#[derive(Debug)]
pub struct CompactJws<'a> {
    algorithm: Algorithm,
    kid: Option<String>,
    claims: Claims,
    signing_input: &'a str,
    signature: Vec<u8>,
}

fn undecodable(reason: &str) -> Unauthenticated {
    Unauthenticated::new(
        AuthFailure::Undecodable,
        format!("Cannot decode the auth token: {}", reason),
    )
}

fn decode_segment(segment: &str) -> Result<Vec<u8>, Unauthenticated> {
    URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| {
            Unauthenticated::with_cause(AuthFailure::Undecodable, "Cannot decode the auth token", e)
        })
}

/// Split and decode `header.payload.signature`
pub fn decode(token: &str) -> Result<CompactJws<'_>, Unauthenticated> {
    let mut parts = token.split('.');
    let (Some(header), Some(payload), Some(signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(undecodable("expected three dot-separated segments"));
    };

    let header: Header = serde_json::from_slice(&decode_segment(header)?).map_err(|e| {
        Unauthenticated::with_cause(AuthFailure::Undecodable, "Cannot decode the auth token", e)
    })?;
    let claims: Map<String, Value> =
        serde_json::from_slice(&decode_segment(payload)?).map_err(|e| {
            Unauthenticated::with_cause(AuthFailure::Undecodable, "Cannot decode the auth token", e)
        })?;

    let signing_input_len = token.len() - signature.len() - 1;
    Ok(CompactJws {
        algorithm: Algorithm::parse(&header.alg)?,
        kid: header.kid,
        claims: Claims::new(claims),
        signing_input: &token[..signing_input_len],
        signature: decode_segment(signature)?,
    })
}

impl CompactJws<'_> {
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    pub fn into_claims(self) -> Claims {
        self.claims
    }

    /// Check the signature against any suitable key.
    ///
    /// A key is suitable when it fits the algorithm and, if both the token
    /// and the key name a `kid`, the names match.
    pub fn verify(&self, keys: &[VerificationKey]) -> Result<(), Unauthenticated> {
        let mut candidates = keys.iter().filter(|key| {
            key.supports(self.algorithm)
                && match (&self.kid, &key.kid) {
                    (Some(wanted), Some(kid)) => wanted == kid,
                    _ => true,
                }
        });

        let Some(first) = candidates.next() else {
            return Err(Unauthenticated::new(
                AuthFailure::NoSuitableKey,
                "Signature verification failed: no suitable signing key",
            ));
        };

        if std::iter::once(first)
            .chain(candidates)
            .any(|key| self.verify_with(key))
        {
            Ok(())
        } else {
            Err(Unauthenticated::new(
                AuthFailure::SignatureInvalid,
                "Signature verification failed",
            ))
        }
    }

    fn verify_with(&self, key: &VerificationKey) -> bool {
        let message = self.signing_input.as_bytes();
        match &key.material {
            KeyMaterial::Ed25519(verifying_key) => Signature::from_slice(&self.signature)
                .map(|signature| verifying_key.verify(message, &signature).is_ok())
                .unwrap_or(false),
            KeyMaterial::Hmac(secret) => {
                constant_time_eq(&hmac_sha256(secret, message), &self.signature)
            }
            KeyMaterial::Rsa(public_key) => public_key
                .verify(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(message), &self.signature)
                .is_ok(),
            // JWS carries the raw 64-byte r || s form
            KeyMaterial::P256(verifying_key) => p256::ecdsa::Signature::from_slice(&self.signature)
                .map(|signature| {
                    p256::ecdsa::signature::Verifier::verify(verifying_key, message, &signature)
                        .is_ok()
                })
                .unwrap_or(false),
        }
    }
}

pub(crate) fn hmac_sha256(secret: &[u8], message: &[u8]) -> [u8; 32] {
    const BLOCK_SIZE: usize = 64;
    let mut key_block = [0u8; BLOCK_SIZE];
    if secret.len() > BLOCK_SIZE {
        let digest = Sha256::digest(secret);
        key_block[..digest.len()].copy_from_slice(&digest);
    } else {
        key_block[..secret.len()].copy_from_slice(secret);
    }

    let mut inner = Sha256::new();
    inner.update(key_block.map(|b| b ^ 0x36));
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    outer.update(key_block.map(|b| b ^ 0x5c));
    outer.update(inner_hash);
    outer.finalize().into()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}


#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;
    use serde_json::json;
    use ed25519_dalek::SigningKey;

    fn ed_key(kid: Option<&str>) -> VerificationKey {
        VerificationKey::ed25519(kid.map(str::to_string), signing_key().verifying_key())
    }

    #[test]
    fn test_hmac_matches_rfc4231_case_2() {
        let mac = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        let expected: [u8; 32] = [
            0x5b, 0xdc, 0xc1, 0x46, 0xbf, 0x60, 0x75, 0x4e, 0x6a, 0x04, 0x24, 0x26, 0x08, 0x95,
            0x75, 0xc7, 0x5a, 0x00, 0x3f, 0x08, 0x9d, 0x27, 0x39, 0x83, 0x9d, 0xec, 0x58, 0xb9,
            0x64, 0xec, 0x38, 0x43,
        ];
        assert_eq!(mac, expected);
    }

    #[test]
    fn test_decodes_claims() {
        let token = eddsa(json!({"alg": "EdDSA"}), json!({"iss": "iss-a", "sub": "u1"}));
        let jws = decode(&token).unwrap();
        assert_eq!(jws.algorithm(), Algorithm::EdDsa);
        assert_eq!(jws.claims().issuer().unwrap(), "iss-a");
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        for token in ["", "a.b", "a.b.c.d", "!!!.e30.e30", "e30.bm90IGpzb24.e30"] {
            let err = decode(token).unwrap_err();
            assert_eq!(err.kind, AuthFailure::Undecodable, "token {:?}", token);
        }
    }

    #[test]
    fn test_rejects_unsupported_algorithm() {
        for alg in ["none", "RS512", "PS256"] {
            let token = eddsa(json!({"alg": alg}), json!({}));
            assert_eq!(decode(&token).unwrap_err().kind, AuthFailure::UnsupportedAlgorithm);
        }
    }

    #[test]
    fn test_verifies_rs256() {
        let token = rs256(json!({"alg": "RS256", "kid": "r1"}), json!({"iss": "iss-a"}));
        let jws = decode(&token).unwrap();
        assert_eq!(jws.algorithm(), Algorithm::Rs256);

        let key = VerificationKey::rsa(Some("r1".into()), rsa_key().to_public_key());
        assert!(jws.verify(&[ed_key(None), key]).is_ok());

        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(json!({"iss": "iss-b"}).to_string());
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);
        let key = VerificationKey::rsa(None, rsa_key().to_public_key());
        assert_eq!(
            decode(&forged).unwrap().verify(&[key]).unwrap_err().kind,
            AuthFailure::SignatureInvalid
        );
    }

    #[test]
    fn test_verifies_es256() {
        let token = es256(json!({"alg": "ES256"}), json!({"iss": "iss-a"}));
        let jws = decode(&token).unwrap();
        assert_eq!(jws.algorithm(), Algorithm::Es256);

        let key = VerificationKey::p256(None, p256::ecdsa::VerifyingKey::from(&p256_key()));
        assert!(jws.verify(&[key]).is_ok());

        let other = p256::ecdsa::SigningKey::from_slice(&[9u8; 32]).unwrap();
        let other = VerificationKey::p256(None, p256::ecdsa::VerifyingKey::from(&other));
        assert_eq!(jws.verify(&[other]).unwrap_err().kind, AuthFailure::SignatureInvalid);
        assert_eq!(jws.verify(&[ed_key(None)]).unwrap_err().kind, AuthFailure::NoSuitableKey);
    }

    #[test]
    fn test_verifies_eddsa() {
        let token = eddsa(json!({"alg": "EdDSA"}), json!({"iss": "iss-a"}));
        let jws = decode(&token).unwrap();
        assert!(jws.verify(&[ed_key(None)]).is_ok());

        let other = VerificationKey::ed25519(None, SigningKey::from_bytes(&[1u8; 32]).verifying_key());
        assert_eq!(jws.verify(&[other]).unwrap_err().kind, AuthFailure::SignatureInvalid);
    }

    #[test]
    fn test_tampered_payload_fails() {
        let token = eddsa(json!({"alg": "EdDSA"}), json!({"sub": "u1"}));
        let forged_payload = URL_SAFE_NO_PAD.encode(json!({"sub": "admin"}).to_string());
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        let jws = decode(&forged).unwrap();
        assert_eq!(jws.verify(&[ed_key(None)]).unwrap_err().kind, AuthFailure::SignatureInvalid);
    }

    #[test]
    fn test_kid_selects_keys() {
        let token = eddsa(json!({"alg": "EdDSA", "kid": "k2"}), json!({}));
        let jws = decode(&token).unwrap();

        assert_eq!(
            jws.verify(&[ed_key(Some("k1"))]).unwrap_err().kind,
            AuthFailure::NoSuitableKey
        );
        assert!(jws.verify(&[ed_key(Some("k1")), ed_key(Some("k2"))]).is_ok());
        assert!(jws.verify(&[ed_key(None)]).is_ok());
    }

    #[test]
    fn test_verifies_hs256() {
        let token = hs256(b"shared-secret", json!({"iss": "iss-a"}));
        let jws = decode(&token).unwrap();
        assert!(jws.verify(&[VerificationKey::hmac(None, b"shared-secret".to_vec())]).is_ok());
        assert_eq!(
            jws.verify(&[VerificationKey::hmac(None, b"wrong".to_vec())]).unwrap_err().kind,
            AuthFailure::SignatureInvalid
        );
        assert_eq!(jws.verify(&[ed_key(None)]).unwrap_err().kind, AuthFailure::NoSuitableKey);
    }
}
