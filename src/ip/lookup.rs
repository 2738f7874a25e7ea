//! Geolocation of a known public IP via ip-api.com.

use super::public::PublicIp;
use crate::config::DEFAULT_LOOKUP_TIMEOUT_MS;
use crate::http::{self, HttpError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct IpLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// No address to look up; no request was made.
    #[error("no public IP to look up")]
    NoPublicIp,
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error("lookup rejected: {0}")]
    Rejected(String),
}

#[derive(Deserialize)]
struct IpApiLookup {
    status: Option<String>,
    message: Option<String>,
    country: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    city: Option<String>,
    zip: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    timezone: Option<String>,
    isp: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl TryFrom<IpApiLookup> for IpLocation {
    type Error = LookupError;

    fn try_from(r: IpApiLookup) -> Result<Self, Self::Error> {
        if r.status.as_deref() != Some("success") {
            return Err(LookupError::Rejected(
                r.message.or(r.status).unwrap_or_else(|| "missing status".into()),
            ));
        }
        Ok(IpLocation {
            country: non_blank(r.country),
            region: non_blank(r.region_name),
            city: non_blank(r.city),
            zip: non_blank(r.zip),
            latitude: r.lat,
            longitude: r.lon,
            timezone: non_blank(r.timezone),
            isp: non_blank(r.isp),
        })
    }
}

pub struct IpLocationLookup {
    base_url: String,
    timeout: Duration,
}

impl IpLocationLookup {
    pub fn new() -> Self {
        Self::with_base_url("http://ip-api.com/json")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn lookup(&self, ip: &PublicIp) -> Result<IpLocation, LookupError> {
        let addr = ip.address().ok_or(LookupError::NoPublicIp)?;
        let url = format!("{}/{}", self.base_url, addr);
        let r: IpApiLookup = http::get_json(&url, self.timeout)?;
        let location = IpLocation::try_from(r);
        if let Err(e) = &location {
            tracing::debug!(ip = %addr, error = %e, "IP location lookup failed");
        }
        location
    }
}

impl Default for IpLocationLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn ip(s: &str) -> PublicIp {
        PublicIp::Address(s.parse().unwrap())
    }

    #[test]
    fn test_lookup_success() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/json/203.0.113.7");
            then.status(200).json_body(json!({
                "status": "success",
                "country": "France",
                "regionName": "Île-de-France",
                "city": "Paris",
                "zip": "75001",
                "lat": 48.86,
                "lon": 2.34,
                "timezone": "Europe/Paris",
                "isp": "Orange"
            }));
        });

        let lookup = IpLocationLookup::with_base_url(server.url("/json/"));
        let loc = lookup.lookup(&ip("203.0.113.7")).unwrap();
        assert_eq!(loc.city.as_deref(), Some("Paris"));
        assert_eq!(loc.region.as_deref(), Some("Île-de-France"));
        assert_eq!(loc.zip.as_deref(), Some("75001"));
        assert_eq!(loc.latitude, Some(48.86));
        mock.assert();
    }

    #[test]
    fn test_lookup_explicit_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/json/10.0.0.1");
            then.status(200).json_body(json!({"status": "fail", "message": "private range"}));
        });

        let lookup = IpLocationLookup::with_base_url(server.url("/json"));
        assert_eq!(
            lookup.lookup(&ip("10.0.0.1")),
            Err(LookupError::Rejected("private range".into()))
        );
    }

    #[test]
    fn test_lookup_transport_failure() {
        let lookup = IpLocationLookup::with_base_url("http://127.0.0.1:9/json").timeout(Duration::from_secs(1));
        assert!(matches!(
            lookup.lookup(&ip("203.0.113.7")),
            Err(LookupError::Http(HttpError::Transport(_)))
        ));
    }

    #[test]
    fn test_sentinel_skips_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"status": "success"}));
        });

        let lookup = IpLocationLookup::with_base_url(server.url("/json"));
        let result = lookup.lookup(&PublicIp::Unavailable("transport error".into()));
        assert_eq!(result, Err(LookupError::NoPublicIp));
        mock.assert_calls(0);
    }

    #[test]
    fn test_blank_fields_absent() {
        let r: IpApiLookup = serde_json::from_value(json!({
            "status": "success", "city": "", "zip": " ", "country": "France"
        }))
        .unwrap();
        let loc = IpLocation::try_from(r).unwrap();
        assert!(loc.city.is_none());
        assert!(loc.zip.is_none());
        assert_eq!(loc.country.as_deref(), Some("France"));
    }
}
