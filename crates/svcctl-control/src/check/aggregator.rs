//! Check-decision cache
//!
//! Answers repeated checks for equivalent requests from memory so that most
//! API calls never reach the backend. A cached decision goes through
//! `fresh -> stale (resend once) -> fresh -> expired`; high-importance
//! operations never enter the cache.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use svcctl_common::clock::elapsed;
use svcctl_common::{
    CheckResponse, Clock, Lookup, Operation, Result, ServiceCheckRequest, TtlLruCache,
    ValidationError,
};
use tracing::{debug, instrument, trace};

use super::options::CheckOptions;
use crate::metrics::CheckMetrics;
use crate::signing::{self, Signature};

/// One cached decision
#[derive(Debug, Clone)]
struct CachedCheck {
    request: ServiceCheckRequest,
    response: CheckResponse,
    last_check_time: DateTime<Utc>,
    /// Refreshed by `add_response` since the last flush
    dirty: bool,
}

/// Caches check responses keyed by request signature
pub struct CheckAggregator {
    service_name: String,
    options: CheckOptions,
    /// `None` when caching is disabled
    cache: Option<TtlLruCache<Signature, CachedCheck>>,
    /// Dirty entries evicted before they could be flushed
    pending: Mutex<Vec<ServiceCheckRequest>>,
    clock: Arc<dyn Clock>,
    metrics: Option<CheckMetrics>,
}

impl CheckAggregator {
    pub fn new(service_name: impl Into<String>, options: CheckOptions, clock: Arc<dyn Clock>) -> Self {
        let cache = TtlLruCache::bounded(options.capacity(), options.expiration, clock.clone());
        Self {
            service_name: service_name.into(),
            options,
            cache,
            pending: Mutex::new(Vec::new()),
            clock,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: CheckMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Resend window, or `None` when caching is disabled
    pub fn flush_interval(&self) -> Option<Duration> {
        self.cache.as_ref().and(self.options.flush_interval)
    }

    /// Look up a cached decision.
    ///
    /// `Ok(None)` tells the caller to send the request to the backend and feed
    /// the answer back through [`CheckAggregator::add_response`].
    #[instrument(skip_all, fields(service = %self.service_name))]
    pub fn check(&self, request: &ServiceCheckRequest) -> Result<Option<CheckResponse>> {
        let operation = self.validate(request)?;
        let signature = signing::sign_operation(operation)?;
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if operation.is_important() {
            self.count(|m| &m.bypassed);
            trace!(%signature, "High-importance operation bypasses the cache");
            return Ok(None);
        }

        let now = self.clock.now();
        let flush_interval = self.options.flush_interval;

        let lookup = cache.lookup_mut(&signature, |entry| {
            if let Some(interval) = flush_interval {
                if elapsed(entry.last_check_time, now) >= interval {
                    entry.last_check_time = now;
                    return None;
                }
            }
            Some(entry.response.clone())
        });

        match lookup {
            Lookup::Hit(Some(response)) => {
                self.count(|m| &m.hits);
                Ok(Some(response))
            }
            Lookup::Hit(None) => {
                self.count(|m| &m.resends);
                debug!(%signature, "Flush interval passed; signalling a resend");
                Ok(None)
            }
            Lookup::Expired(entry) => {
                self.count(|m| &m.evictions);
                debug!(%signature, "Cached check expired");
                self.retain_if_dirty(entry);
                Ok(None)
            }
            Lookup::Miss => {
                self.count(|m| &m.misses);
                Ok(None)
            }
        }
    }

    /// Store the backend's answer for `request`, restarting its lifetime
    #[instrument(skip_all, fields(service = %self.service_name))]
    pub fn add_response(&self, request: &ServiceCheckRequest, response: CheckResponse) -> Result<()> {
        let operation = self.validate(request)?;
        let signature = signing::sign_operation(operation)?;
        let Some(cache) = &self.cache else {
            return Ok(());
        };
        if operation.is_important() {
            return Ok(());
        }

        let entry = CachedCheck {
            request: request.clone(),
            response,
            last_check_time: self.clock.now(),
            dirty: true,
        };

        if let Some((_, victim)) = cache.insert(signature, entry) {
            self.count(|m| &m.evictions);
            self.retain_if_dirty(victim);
        }
        debug!(%signature, "Cached check response");
        Ok(())
    }

    /// Drain requests refreshed by `add_response` since the previous flush
    pub fn flush(&self) -> Vec<ServiceCheckRequest> {
        let Some(cache) = &self.cache else {
            return Vec::new();
        };

        for (_, entry) in cache.purge_expired() {
            self.count(|m| &m.evictions);
            self.retain_if_dirty(entry);
        }

        let mut flushed = std::mem::take(&mut *self.pending.lock());
        cache.for_each_mut(|_, entry| {
            if entry.dirty {
                entry.dirty = false;
                flushed.push(entry.request.clone());
            }
        });

        if !flushed.is_empty() {
            debug!(count = flushed.len(), "Flushed updated checks");
        }
        flushed
    }

    /// Drop every cached decision and anything awaiting a flush
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
        self.pending.lock().clear();
    }

    fn validate<'a>(&self, request: &'a ServiceCheckRequest) -> Result<&'a Operation> {
        if request.service_name != self.service_name {
            return Err(ValidationError::ServiceNameMismatch {
                expected: self.service_name.clone(),
                actual: request.service_name.clone(),
            }
            .into());
        }
        let check_request = request
            .check_request
            .as_ref()
            .ok_or(ValidationError::MissingCheckRequest)?;
        let operation = check_request
            .operation
            .as_ref()
            .ok_or(ValidationError::MissingOperation)?;
        Ok(operation)
    }

    fn retain_if_dirty(&self, entry: CachedCheck) {
        if entry.dirty {
            self.pending.lock().push(entry.request);
        }
    }

    fn count(&self, counter: impl FnOnce(&CheckMetrics) -> &prometheus::IntCounter) {
        if let Some(metrics) = &self.metrics {
            counter(metrics).inc();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcctl_common::{
        CheckError, CheckErrorCode, ControlError, Importance, ManualClock, Operation,
    };

    const SERVICE_NAME: &str = "service.with_cache";
    const OPERATION_ID: &str = "service.with_cache.op_id";

    fn request(service_name: &str, importance: Importance) -> ServiceCheckRequest {
        ServiceCheckRequest::new(
            service_name,
            Operation::new("testOperationName", "testConsumerID")
                .with_importance(importance)
                .with_label("key1", "value1"),
        )
    }

    fn low() -> ServiceCheckRequest {
        request(SERVICE_NAME, Importance::Low)
    }

    fn caching_aggregator() -> (CheckAggregator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at_epoch());
        let options = CheckOptions::new(10, Some(Duration::from_secs(1)), Duration::from_secs(2));
        (CheckAggregator::new(SERVICE_NAME, options, clock.clone()), clock)
    }

    fn response() -> CheckResponse {
        CheckResponse::new(OPERATION_ID)
    }

    #[test]
    fn test_rejects_mismatched_service_name() {
        let (agg, _) = caching_aggregator();
        let err = agg.check(&request("another.service", Importance::Low)).unwrap_err();
        assert!(err.is_contract_violation());
        assert!(matches!(
            err,
            ControlError::Validation(ValidationError::ServiceNameMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_missing_check_request() {
        let (agg, _) = caching_aggregator();
        let req = ServiceCheckRequest {
            service_name: SERVICE_NAME.to_string(),
            check_request: None,
        };
        assert!(matches!(
            agg.check(&req),
            Err(ControlError::Validation(ValidationError::MissingCheckRequest))
        ));
    }

    #[test]
    fn test_rejects_missing_operation() {
        let (agg, _) = caching_aggregator();
        let req = ServiceCheckRequest {
            service_name: SERVICE_NAME.to_string(),
            check_request: Some(Default::default()),
        };
        assert!(matches!(
            agg.add_response(&req, response()),
            Err(ControlError::Validation(ValidationError::MissingOperation))
        ));
    }

    #[test]
    fn test_important_operations_still_need_a_consumer() {
        let (agg, _) = caching_aggregator();
        let mut req = request(SERVICE_NAME, Importance::High);
        if let Some(op) = req.check_request.as_mut().and_then(|c| c.operation.as_mut()) {
            op.consumer_id = None;
        }

        assert!(matches!(
            agg.check(&req),
            Err(ControlError::Validation(ValidationError::MissingOperationField("consumer id")))
        ));
        assert!(agg.add_response(&req, response()).is_err());
    }

    #[test]
    fn test_unseen_request_is_not_cached() {
        let (agg, _) = caching_aggregator();
        assert_eq!(agg.check(&low()).unwrap(), None);
    }

    #[test]
    fn test_disabled_cache_passes_everything_through() {
        let clock = Arc::new(ManualClock::at_epoch());
        let agg = CheckAggregator::new(SERVICE_NAME, CheckOptions::disabled(), clock);

        assert_eq!(agg.check(&low()).unwrap(), None);
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert!(agg.flush().is_empty());
        assert_eq!(agg.flush_interval(), None);
    }

    #[test]
    fn test_flush_interval_is_configured_window() {
        let (agg, _) = caching_aggregator();
        assert_eq!(agg.flush_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_caches_responses() {
        let (agg, _) = caching_aggregator();
        assert_eq!(agg.check(&low()).unwrap(), None);
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));
    }

    #[test]
    fn test_equivalent_requests_share_an_entry() {
        let (agg, _) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();

        let mut other = low();
        if let Some(op) = other.check_request.as_mut().and_then(|c| c.operation.as_mut()) {
            op.operation_id = Some("a-different-call".to_string());
        }
        assert_eq!(agg.check(&other).unwrap(), Some(response()));
    }

    #[test]
    fn test_never_caches_important_operations() {
        let (agg, _) = caching_aggregator();
        let req = request(SERVICE_NAME, Importance::High);
        assert_eq!(agg.check(&req).unwrap(), None);
        agg.add_response(&req, response()).unwrap();
        assert_eq!(agg.check(&req).unwrap(), None);
        assert!(agg.flush().is_empty());
    }

    #[test]
    fn test_signals_a_resend_once_after_flush_interval() {
        let (agg, clock) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);

        assert_eq!(agg.check(&low()).unwrap(), Some(response()));
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        clock.tick();
        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.check(&low()).unwrap(), None);
    }

    #[test]
    fn test_resend_applies_to_error_responses() {
        let (agg, clock) = caching_aggregator();
        let failed = response().with_error(CheckError::new(CheckErrorCode::NotFound));
        agg.add_response(&low(), failed.clone()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(failed.clone()));

        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.check(&low()).unwrap(), Some(failed));
    }

    #[test]
    fn test_add_response_extends_expiration() {
        let (agg, clock) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();

        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        clock.tick();
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));
    }

    #[test]
    fn test_flush_returns_only_updated_entries() {
        let (agg, _) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        assert_eq!(agg.flush(), vec![low()]);
        assert!(agg.flush().is_empty());

        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.flush().len(), 1);
    }

    #[test]
    fn test_flush_keeps_updates_of_expired_entries() {
        let (agg, clock) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();
        clock.tick();
        clock.tick();
        clock.tick();

        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.flush(), vec![low()]);
        assert!(agg.flush().is_empty());
    }

    #[test]
    fn test_flush_purges_expired_entries() {
        let (agg, clock) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.flush().len(), 1);

        clock.tick();
        clock.tick();
        clock.tick();
        assert!(agg.flush().is_empty());
        assert_eq!(agg.check(&low()).unwrap(), None);
    }

    #[test]
    fn test_flush_keeps_updates_of_lru_victims() {
        let clock = Arc::new(ManualClock::at_epoch());
        let options = CheckOptions::new(1, Some(Duration::from_secs(1)), Duration::from_secs(2));
        let agg = CheckAggregator::new(SERVICE_NAME, options, clock);

        let other = ServiceCheckRequest::new(
            SERVICE_NAME,
            Operation::new("otherOperation", "testConsumerID"),
        );
        agg.add_response(&low(), response()).unwrap();
        agg.add_response(&other, response()).unwrap();

        assert_eq!(agg.check(&low()).unwrap(), None);
        assert_eq!(agg.flush().len(), 2);
    }

    #[test]
    fn test_clear_empties_cache_and_pending() {
        let (agg, clock) = caching_aggregator();
        agg.add_response(&low(), response()).unwrap();
        assert_eq!(agg.check(&low()).unwrap(), Some(response()));

        agg.clear();
        assert_eq!(agg.check(&low()).unwrap(), None);
        assert!(agg.flush().is_empty());

        agg.add_response(&low(), response()).unwrap();
        clock.tick();
        clock.tick();
        assert_eq!(agg.check(&low()).unwrap(), None);
        agg.clear();
        assert!(agg.flush().is_empty());
    }

    #[test]
    fn test_counts_cache_outcomes() {
        let (agg, clock) = caching_aggregator();
        let metrics = CheckMetrics::new().unwrap();
        let agg = agg.with_metrics(metrics.clone());

        agg.check(&low()).unwrap();
        agg.add_response(&low(), response()).unwrap();
        agg.check(&low()).unwrap();
        clock.tick();
        agg.check(&low()).unwrap();
        agg.check(&request(SERVICE_NAME, Importance::High)).unwrap();

        assert_eq!(metrics.misses.get(), 1);
        assert_eq!(metrics.hits.get(), 1);
        assert_eq!(metrics.resends.get(), 1);
        assert_eq!(metrics.bypassed.get(), 1);
    }

    #[test]
    fn test_concurrent_checks_and_responses() {
        let (agg, _) = caching_aggregator();
        std::thread::scope(|s| {
            for i in 0..4 {
                let agg = &agg;
                s.spawn(move || {
                    let req = ServiceCheckRequest::new(
                        SERVICE_NAME,
                        Operation::new(format!("op-{}", i), "testConsumerID"),
                    );
                    for _ in 0..50 {
                        if agg.check(&req).unwrap().is_none() {
                            agg.add_response(&req, response()).unwrap();
                        }
                    }
                });
            }
        });
        assert_eq!(agg.flush().len(), 4);
    }
}
