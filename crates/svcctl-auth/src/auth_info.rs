//! Per-method authentication policy

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Which providers and audiences a method accepts
pub trait AuthInfo: Send + Sync {
    fn is_provider_allowed(&self, provider_id: &str) -> bool;

    /// Audiences accepted besides the service name itself
    fn allowed_audiences(&self, provider_id: &str) -> BTreeSet<String>;
}

/// Policy for one method: allowed provider ids and their extra audiences
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodAuthInfo {
    providers: HashMap<String, BTreeSet<String>>,
}

impl MethodAuthInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `provider_id`, accepting tokens for `audiences` as well as the service
    pub fn allow<I, S>(mut self, provider_id: impl Into<String>, audiences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.providers
            .entry(provider_id.into())
            .or_default()
            .extend(audiences.into_iter().map(Into::into));
        self
    }
}

impl AuthInfo for MethodAuthInfo {
    fn is_provider_allowed(&self, provider_id: &str) -> bool {
        self.providers.contains_key(provider_id)
    }

    fn allowed_audiences(&self, provider_id: &str) -> BTreeSet<String> {
        self.providers.get(provider_id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow() {
        let info = MethodAuthInfo::new()
            .allow("prov-1", ["svcA"])
            .allow("prov-2", Vec::<String>::new());

        assert!(info.is_provider_allowed("prov-1"));
        assert!(info.is_provider_allowed("prov-2"));
        assert!(!info.is_provider_allowed("prov-3"));
        assert_eq!(info.allowed_audiences("prov-1"), BTreeSet::from(["svcA".to_string()]));
        assert!(info.allowed_audiences("prov-3").is_empty());
    }

    #[test]
    fn test_deserializes_from_map() {
        let info: MethodAuthInfo =
            serde_json::from_str(r#"{"prov-1": ["svcA", "svcB"]}"#).unwrap();
        assert_eq!(info.allowed_audiences("prov-1").len(), 2);
    }
}
