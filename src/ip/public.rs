//! Public IP discovery through ipify.

use crate::config::DEFAULT_LOOKUP_TIMEOUT_MS;
use crate::http;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

/// The host's public address, or why it could not be determined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicIp {
    Address(IpAddr),
    Unavailable(String),
}

impl PublicIp {
    pub fn address(&self) -> Option<IpAddr> {
        match self {
            Self::Address(ip) => Some(*ip),
            Self::Unavailable(_) => None,
        }
    }
}

impl fmt::Display for PublicIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(ip) => write!(f, "{}", ip),
            Self::Unavailable(reason) => write!(f, "Unable to determine public IP ({})", reason),
        }
    }
}

#[derive(Deserialize)]
struct IpifyResponse {
    ip: String,
}

pub struct PublicIpResolver {
    endpoint: String,
    timeout: Duration,
}

impl PublicIpResolver {
    pub fn new() -> Self {
        Self::with_endpoint("https://api.ipify.org?format=json")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// One attempt. Every failure collapses to [`PublicIp::Unavailable`].
    pub fn resolve(&self) -> PublicIp {
        let r: IpifyResponse = match http::get_json(&self.endpoint, self.timeout) {
            Ok(r) => r,
            Err(e) => {
                tracing::debug!(error = %e, "public IP lookup failed");
                return PublicIp::Unavailable(e.to_string());
            }
        };

        match r.ip.trim().parse::<IpAddr>() {
            Ok(ip) => PublicIp::Address(ip),
            Err(_) => PublicIp::Unavailable(format!("not an IP literal: {:?}", r.ip)),
        }
    }
}

impl Default for PublicIpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn test_resolve_ok() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/").query_param("format", "json");
            then.status(200).json_body(json!({"ip": "198.51.100.23"}));
        });

        let r = PublicIpResolver::with_endpoint(server.url("/?format=json"));
        assert_eq!(r.resolve(), PublicIp::Address("198.51.100.23".parse().unwrap()));
    }

    #[test]
    fn test_resolve_ipv6() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).json_body(json!({"ip": "2001:db8::1"}));
        });

        let ip = PublicIpResolver::with_endpoint(server.url("/")).resolve();
        assert!(ip.address().unwrap().is_ipv6());
    }

    #[test]
    fn test_transport_error_is_sentinel() {
        let r = PublicIpResolver::with_endpoint("http://127.0.0.1:9/").timeout(Duration::from_secs(1));
        assert!(matches!(r.resolve(), PublicIp::Unavailable(_)));
    }

    #[test]
    fn test_garbage_ip_is_sentinel() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/");
            then.status(200).json_body(json!({"ip": "localhost"}));
        });

        let ip = PublicIpResolver::with_endpoint(server.url("/")).resolve();
        assert!(ip.address().is_none());
    }

    #[test]
    fn test_serialization() {
        let ok = serde_json::to_value(PublicIp::Address("192.0.2.1".parse().unwrap())).unwrap();
        assert_eq!(ok, json!({"address": "192.0.2.1"}));
        let none = serde_json::to_value(PublicIp::Unavailable("offline".into())).unwrap();
        assert_eq!(none, json!({"unavailable": "offline"}));
    }
}
