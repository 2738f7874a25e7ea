//! Ordered provider registry built once at start-up.

use super::providers::{
    GeocoderIpProvider, IpApiProvider, IpapiProvider, LocationProvider, WifiScanProvider,
};
use crate::config::RegistryConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The built-in provider kinds a configuration file may name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    Geocoder,
    IpApi,
    Ipapi,
    WifiScan,
}

impl ProviderKind {
    /// Whether the provider needs outbound network access.
    pub fn is_network(self) -> bool {
        !matches!(self, Self::WifiScan)
    }

    /// Build the adapter. `None` when it cannot run on this host.
    fn adapter(self) -> Option<Arc<dyn LocationProvider>> {
        match self {
            Self::Geocoder => Some(Arc::new(GeocoderIpProvider::new())),
            Self::IpApi => Some(Arc::new(IpApiProvider::new())),
            Self::Ipapi => Some(Arc::new(IpapiProvider::new())),
            Self::WifiScan => WifiScanProvider::detect().map(|p| Arc::new(p) as Arc<dyn LocationProvider>),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Geocoder => write!(f, "geocoder"),
            Self::IpApi => write!(f, "ip-api"),
            Self::Ipapi => write!(f, "ipapi"),
            Self::WifiScan => write!(f, "wifi-scan"),
        }
    }
}

/// A registry entry: one adapter with its priority and timeout budget.
#[derive(Clone)]
pub struct ProviderSpec {
    pub priority: u32,
    pub timeout: Duration,
    pub adapter: Arc<dyn LocationProvider>,
}

impl ProviderSpec {
    pub fn new(priority: u32, timeout: Duration, adapter: Arc<dyn LocationProvider>) -> Self {
        Self { priority, timeout, adapter }
    }

    pub fn identifier(&self) -> &str {
        self.adapter.id()
    }
}

impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("identifier", &self.identifier())
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Providers in invocation order. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    specs: Vec<ProviderSpec>,
}

impl ProviderRegistry {
    /// Order by ascending priority; equal priorities keep the given order.
    pub fn new(mut specs: Vec<ProviderSpec>) -> Self {
        specs.sort_by_key(|s| s.priority);
        Self { specs }
    }

    /// Build the registry from configuration, skipping disabled entries and
    /// adapters that cannot run here. With `network` false only local
    /// adapters are kept.
    pub fn from_config(config: &RegistryConfig, network: bool) -> Self {
        let mut specs = Vec::new();
        for entry in &config.providers {
            if !entry.enabled {
                tracing::debug!(provider = %entry.provider, "disabled by configuration");
                continue;
            }
            if !network && entry.provider.is_network() {
                tracing::debug!(provider = %entry.provider, "skipped in offline mode");
                continue;
            }
            match entry.provider.adapter() {
                Some(adapter) => specs.push(ProviderSpec::new(entry.priority, entry.timeout(), adapter)),
                None => tracing::debug!(provider = %entry.provider, "not available on this host"),
            }
        }
        Self::new(specs)
    }

    pub fn specs(&self) -> &[ProviderSpec] {
        &self.specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderEntry;
    use crate::location::types::{LocationCandidate, ProviderError};

    struct Named(&'static str);

    impl LocationProvider for Named {
        fn id(&self) -> &str {
            self.0
        }

        fn locate(&self, _budget: Duration) -> Result<LocationCandidate, ProviderError> {
            Ok(LocationCandidate::new(self.0))
        }
    }

    fn spec(priority: u32, id: &'static str) -> ProviderSpec {
        ProviderSpec::new(priority, Duration::from_secs(1), Arc::new(Named(id)))
    }

    fn ids(r: &ProviderRegistry) -> Vec<&str> {
        r.specs().iter().map(|s| s.identifier()).collect()
    }

    #[test]
    fn test_sorted_by_priority() {
        let r = ProviderRegistry::new(vec![spec(30, "c"), spec(10, "a"), spec(20, "b")]);
        assert_eq!(ids(&r), ["a", "b", "c"]);
    }

    #[test]
    fn test_equal_priority_keeps_declaration_order() {
        let r = ProviderRegistry::new(vec![spec(5, "x"), spec(1, "first"), spec(5, "y"), spec(5, "z")]);
        assert_eq!(ids(&r), ["first", "x", "y", "z"]);
    }

    #[test]
    fn test_default_config_order() {
        let r = ProviderRegistry::from_config(&RegistryConfig::default(), true);
        let ids = ids(&r);
        // WiFi scan depends on the host, the network providers do not.
        assert_eq!(&ids[..3], ["Geocoder IP", "IP-API Service", "IPAPI Service"]);
        assert!(ids.len() == 3 || ids[3] == "WiFi Scan");
    }

    #[test]
    fn test_offline_drops_network_providers() {
        let r = ProviderRegistry::from_config(&RegistryConfig::default(), false);
        assert!(r.specs().iter().all(|s| s.identifier() == "WiFi Scan"));
    }

    #[test]
    fn test_disabled_entries_skipped() {
        let config = RegistryConfig {
            providers: vec![
                ProviderEntry { provider: ProviderKind::IpApi, enabled: false, priority: 1, timeout_ms: None },
                ProviderEntry { provider: ProviderKind::Ipapi, enabled: true, priority: 2, timeout_ms: Some(750) },
            ],
        };
        let r = ProviderRegistry::from_config(&config, true);
        assert_eq!(ids(&r), ["IPAPI Service"]);
        assert_eq!(r.specs()[0].timeout, Duration::from_millis(750));
    }

    #[test]
    fn test_kind_serde_names() {
        let kinds: Vec<ProviderKind> =
            serde_json::from_str(r#"["geocoder", "ip-api", "ipapi", "wifi-scan"]"#).unwrap();
        assert_eq!(
            kinds,
            [ProviderKind::Geocoder, ProviderKind::IpApi, ProviderKind::Ipapi, ProviderKind::WifiScan]
        );
        for k in kinds {
            assert_eq!(serde_json::to_value(k).unwrap(), k.to_string());
        }
    }
}
