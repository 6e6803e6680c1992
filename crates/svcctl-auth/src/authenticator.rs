//! Token authentication
//!
//! Decoding and signature verification are cached per raw token; the claim
//! checks that depend on the current time run on every call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use svcctl_common::{Clock, TtlLruCache};
use tracing::{debug, instrument};

use crate::auth_info::AuthInfo;
use crate::claims::Claims;
use crate::error::{AuthFailure, Unauthenticated};
use crate::jws;
use crate::keys::KeySupplier;
use crate::user_info::UserInfo;

pub const DEFAULT_CACHE_CAPACITY: usize = 200;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Verifies bearer tokens against an issuer and audience policy
pub struct Authenticator {
    /// Issuer -> provider id
    issuers: HashMap<String, String>,
    supplier: Arc<dyn KeySupplier>,
    /// Raw token -> verified claims; `None` when disabled
    cache: Option<TtlLruCache<String, Arc<Claims>>>,
    clock: Arc<dyn Clock>,
}

impl Authenticator {
    pub fn new(
        issuers_to_provider_ids: HashMap<String, String>,
        supplier: Arc<dyn KeySupplier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let cache = TtlLruCache::bounded(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL, clock.clone());
        Self {
            issuers: issuers_to_provider_ids,
            supplier,
            cache,
            clock,
        }
    }

    /// Resize the claims cache; a zero capacity disables it
    pub fn with_cache(mut self, capacity: usize, ttl: Duration) -> Self {
        self.cache = TtlLruCache::bounded(capacity, ttl, self.clock.clone());
        self
    }

    /// Identify the caller behind `token` for a method guarded by `auth_info`
    #[instrument(skip_all, fields(service = %service_name))]
    pub fn authenticate(
        &self,
        token: &str,
        auth_info: &dyn AuthInfo,
        service_name: &str,
    ) -> Result<UserInfo, Unauthenticated> {
        let claims = self.claims(token)?;
        claims.check_time_claims(self.clock.now())?;

        let user_info = UserInfo::from_claims(&claims)?;

        let provider_id = self.issuers.get(&user_info.issuer).ok_or_else(|| {
            Unauthenticated::new(
                AuthFailure::UnknownIssuer,
                format!("Unknown issuer: {}", user_info.issuer),
            )
        })?;

        if !auth_info.is_provider_allowed(provider_id) {
            return Err(Unauthenticated::new(
                AuthFailure::ProviderNotAllowed,
                format!("The requested method does not allow provider id: {}", provider_id),
            ));
        }

        // Accept when an audience is the service itself or one the method allows
        let has_service_name = user_info.audiences.contains(service_name);
        let allowed = auth_info.allowed_audiences(provider_id);
        if !has_service_name && allowed.is_disjoint(&user_info.audiences) {
            return Err(Unauthenticated::new(
                AuthFailure::AudienceNotAllowed,
                "Audiences not allowed",
            ));
        }

        debug!(issuer = %user_info.issuer, subject = %user_info.subject_id, "Authenticated");
        Ok(user_info)
    }

    /// Decoded and signature-checked claims, from the cache when possible
    pub fn claims(&self, token: &str) -> Result<Arc<Claims>, Unauthenticated> {
        let key = token.to_string();
        if let Some(cache) = &self.cache {
            if let Some(claims) = cache.get(&key) {
                return Ok(claims);
            }
        }

        // Verification runs outside the cache lock
        let claims = Arc::new(self.decode_and_verify(token)?);
        if let Some(cache) = &self.cache {
            cache.insert(key, claims.clone());
        }
        Ok(claims)
    }

    fn decode_and_verify(&self, token: &str) -> Result<Claims, Unauthenticated> {
        let jws = jws::decode(token)?;
        jws.claims().verify_required_claims_exist()?;

        let issuer = jws.claims().issuer()?;
        let keys = self.supplier.supply(issuer).map_err(|e| {
            Unauthenticated::with_cause(
                AuthFailure::NoSuitableKey,
                "Signature verification failed: no suitable signing key",
                e,
            )
        })?;
        jws.verify(&keys)?;
        Ok(jws.into_claims())
    }
}
