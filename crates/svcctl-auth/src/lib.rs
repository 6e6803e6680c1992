//! # svcctl Auth
//!
//! Bearer-token authentication for the service-control client.
//!
//! ```text
//! token -> decode (JWS compact) -> required claims -> KeySupplier::supply(iss)
//!       -> signature check -> [claims cache] -> exp/nbf -> issuer -> provider
//!       -> audience policy -> UserInfo
//! ```
//!
//! Supported signature algorithms are `RS256`, `ES256` (P-256), `EdDSA`
//! (Ed25519) and `HS256`.

pub mod auth_info;
pub mod authenticator;
pub mod claims;
pub mod error;
pub mod jws;
pub mod keys;
pub mod user_info;

pub use auth_info::{AuthInfo, MethodAuthInfo};
pub use authenticator::Authenticator;
pub use claims::Claims;
pub use error::{AuthFailure, KeySupplyError, Unauthenticated};
pub use keys::{parse_jwks, KeySupplier, StaticKeySupplier, VerificationKey};
pub use user_info::UserInfo;
