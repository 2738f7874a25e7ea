//! Provider registry configuration.
//!
//! Optional JSON file at `<config_dir>/device-probe/providers.json`. A missing
//! default file means built-in defaults; a file that exists must parse.

use crate::location::ProviderKind;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default budget for the HTTP location providers.
pub const DEFAULT_PROVIDER_TIMEOUT_MS: u64 = 3_000;
/// `iwlist scan` is slower than an HTTP round trip.
pub const DEFAULT_SCAN_TIMEOUT_MS: u64 = 5_000;
/// Budget for the public-IP resolver and the IP location lookup.
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("provider '{0}' is listed more than once")]
    Duplicate(ProviderKind),
}

fn default_enabled() -> bool {
    true
}

/// One provider entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub provider: ProviderKind,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Lower runs first and wins the primary slot on ties of success.
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ProviderEntry {
    pub fn timeout(&self) -> Duration {
        let ms = self.timeout_ms.unwrap_or(match self.provider {
            ProviderKind::WifiScan => DEFAULT_SCAN_TIMEOUT_MS,
            _ => DEFAULT_PROVIDER_TIMEOUT_MS,
        });
        Duration::from_millis(ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub providers: Vec<ProviderEntry>,
}

impl Default for RegistryConfig {
    /// Local geocoding first, the two IP services next, the network scan last.
    fn default() -> Self {
        let entry = |provider, priority| ProviderEntry {
            provider,
            enabled: true,
            priority,
            timeout_ms: None,
        };
        Self {
            providers: vec![
                entry(ProviderKind::Geocoder, 10),
                entry(ProviderKind::IpApi, 20),
                entry(ProviderKind::Ipapi, 30),
                entry(ProviderKind::WifiScan, 40),
            ],
        }
    }
}

impl RegistryConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("device-probe").join("providers.json"))
    }

    /// Load from a specific file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `explicit` if given, else the default path if it exists, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.is_file() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Apply one timeout to every provider.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        for entry in &mut self.providers {
            entry.timeout_ms = Some(ms);
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for entry in &self.providers {
            if !seen.insert(entry.provider) {
                return Err(ConfigError::Duplicate(entry.provider));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("providers.json");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_default_order_and_timeouts() {
        let c = RegistryConfig::default();
        let kinds: Vec<ProviderKind> = c.providers.iter().map(|e| e.provider).collect();
        assert_eq!(
            kinds,
            [ProviderKind::Geocoder, ProviderKind::IpApi, ProviderKind::Ipapi, ProviderKind::WifiScan]
        );
        assert_eq!(c.providers[0].timeout(), Duration::from_secs(3));
        assert_eq!(c.providers[3].timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_load_file() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"providers": [
                {"provider": "ipapi", "priority": 1, "timeout_ms": 1500},
                {"provider": "geocoder", "priority": 2, "enabled": false}
            ]}"#,
        );
        let c = RegistryConfig::load(Some(&path)).unwrap();
        assert_eq!(c.providers.len(), 2);
        assert_eq!(c.providers[0].timeout(), Duration::from_millis(1500));
        assert!(!c.providers[1].enabled);
    }

    #[test]
    fn test_load_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = RegistryConfig::load(Some(&dir.path().join("nope.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_malformed() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, r#"{"providers": [{"provider": "carrier-pigeon", "priority": 1}]}"#);
        assert!(matches!(RegistryConfig::load_from(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_duplicate_provider_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"providers": [
                {"provider": "ip-api", "priority": 1},
                {"provider": "ip-api", "priority": 2}
            ]}"#,
        );
        assert!(matches!(
            RegistryConfig::load_from(&path),
            Err(ConfigError::Duplicate(ProviderKind::IpApi))
        ));
    }

    #[test]
    fn test_with_timeout_overrides_all() {
        let c = RegistryConfig::default().with_timeout(Duration::from_millis(800));
        assert!(c.providers.iter().all(|e| e.timeout() == Duration::from_millis(800)));
    }
}
