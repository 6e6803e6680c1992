//! Prometheus counters for the check cache

use prometheus::{IntCounter, Registry};

/// Counters updated by [`crate::check::CheckAggregator`]
#[derive(Clone)]
pub struct CheckMetrics {
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub resends: IntCounter,
    pub evictions: IntCounter,
    pub bypassed: IntCounter,
}

impl CheckMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        Ok(Self {
            hits: IntCounter::new(
                "svcctl_check_cache_hits_total",
                "Checks answered from the cache",
            )?,
            misses: IntCounter::new(
                "svcctl_check_cache_misses_total",
                "Checks with no cached answer",
            )?,
            resends: IntCounter::new(
                "svcctl_check_cache_resends_total",
                "Cached checks sent again after the flush interval",
            )?,
            evictions: IntCounter::new(
                "svcctl_check_cache_evictions_total",
                "Cached checks evicted by expiry or capacity",
            )?,
            bypassed: IntCounter::new(
                "svcctl_check_cache_bypassed_total",
                "High-importance checks routed around the cache",
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.resends.clone()))?;
        registry.register(Box::new(self.evictions.clone()))?;
        registry.register(Box::new(self.bypassed.clone()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_exposes_all_counters() {
        let registry = Registry::new();
        let metrics = CheckMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        metrics.hits.inc();

        let families = registry.gather();
        assert_eq!(families.len(), 5);
        let hits = families
            .iter()
            .find(|f| f.get_name() == "svcctl_check_cache_hits_total")
            .unwrap();
        assert_eq!(hits.get_metric()[0].get_counter().get_value(), 1.0);
    }

    #[test]
    fn test_double_registration_fails() {
        let registry = Registry::new();
        let metrics = CheckMetrics::new().unwrap();
        metrics.register(&registry).unwrap();
        assert!(metrics.register(&registry).is_err());
    }
}
