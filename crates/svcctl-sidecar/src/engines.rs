//! Construction of the check, report and auth engines from configuration

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use prometheus::Registry;
use svcctl_auth::{Authenticator, StaticKeySupplier};
use svcctl_common::{Clock, MetricKind, Operation};
use svcctl_control::{CheckAggregator, CheckMetrics, OperationAggregator};
use tracing::info;

use crate::config::{AuthSettings, SidecarConfig};

pub struct Engines {
    pub check: CheckAggregator,
    pub authenticator: Authenticator,
    pub registry: Registry,
    metric_kinds: HashMap<String, MetricKind>,
}

impl Engines {
    pub fn build(config: &SidecarConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let registry = Registry::new();
        let metrics = CheckMetrics::new().context("failed to create check metrics")?;
        metrics
            .register(&registry)
            .context("failed to register check metrics")?;

        let check = CheckAggregator::new(
            config.service_name.clone(),
            config.check.to_options(),
            clock.clone(),
        )
        .with_metrics(metrics);

        let supplier = load_key_supplier(&config.auth)?;
        let authenticator =
            Authenticator::new(config.auth.issuers.clone(), Arc::new(supplier), clock)
                .with_cache(config.auth.token_cache_capacity, config.auth.token_cache_ttl());

        info!(
            service = %config.service_name,
            check_caching = config.check.to_options().caching_enabled(),
            issuers = config.auth.issuers.len(),
            "Engines ready"
        );

        Ok(Self {
            check,
            authenticator,
            registry,
            metric_kinds: config.metric_kinds.clone(),
        })
    }

    /// Start aggregating report operations with the configured metric kinds
    pub fn operation_aggregator(&self, initial: Operation) -> OperationAggregator {
        OperationAggregator::new(initial, Some(self.metric_kinds.clone()))
    }
}

fn load_key_supplier(settings: &AuthSettings) -> Result<StaticKeySupplier> {
    let mut supplier = StaticKeySupplier::new();
    for (issuer, path) in &settings.jwks {
        let document = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read JWKS for {} from {}", issuer, path.display()))?;
        supplier = supplier
            .with_jwks(issuer.clone(), &document)
            .with_context(|| format!("invalid JWKS for {}", issuer))?;
    }
    Ok(supplier)
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcctl_auth::{AuthFailure, MethodAuthInfo};
    use svcctl_common::{ManualClock, MetricValue, MetricValueSet, ServiceCheckRequest, Value};

    fn config(document: &str) -> SidecarConfig {
        SidecarConfig::from_toml(document).unwrap()
    }

    #[test]
    fn test_builds_from_minimal_config() {
        let engines = Engines::build(&config(r#"service_name = "svcA""#), Arc::new(ManualClock::at_epoch())).unwrap();

        assert_eq!(engines.check.service_name(), "svcA");
        assert_eq!(engines.registry.gather().len(), 5);

        let req = ServiceCheckRequest::new("svcA", Operation::new("op", "project:p"));
        assert_eq!(engines.check.check(&req).unwrap(), None);
    }

    #[test]
    fn test_authenticator_rejects_garbage() {
        let engines = Engines::build(&config(r#"service_name = "svcA""#), Arc::new(ManualClock::at_epoch())).unwrap();
        let err = engines
            .authenticator
            .authenticate("garbage", &MethodAuthInfo::new(), "svcA")
            .unwrap_err();
        assert_eq!(err.kind, AuthFailure::Undecodable);
    }

    #[test]
    fn test_missing_jwks_file_fails() {
        let document = r#"
            service_name = "svcA"
            [auth.jwks]
            "iss-a" = "/nonexistent/svcctl/keys.jwks"
        "#;
        assert!(Engines::build(&config(document), Arc::new(ManualClock::at_epoch())).is_err());
    }

    #[test]
    fn test_operation_aggregator_uses_metric_kinds() {
        let document = r#"
            service_name = "svcA"
            [metric_kinds]
            "on_loan" = "GAUGE"
        "#;
        let engines = Engines::build(&config(document), Arc::new(ManualClock::at_epoch())).unwrap();
        let op = |n| {
            Operation::new("op", "project:p")
                .with_metric_values(MetricValueSet::new("on_loan", vec![MetricValue::int64(n)]))
        };

        let agg = engines.operation_aggregator(op(5));
        agg.add(&op(2));
        let merged = agg.as_operation();
        assert_eq!(merged.metric_value_sets[0].metric_values[0].value, Value::Int64(2));
    }
}
