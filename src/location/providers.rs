//! Location providers: ipinfo geocoder, ip-api.com, ipapi.co, and a WiFi scan heuristic.
//!
//! Each adapter owns the schema translation for its source and reports every
//! failure as a [`ProviderError`].

use super::types::{LocationCandidate, ProviderError};
use crate::http;
use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

/// One external location source.
///
/// Implementations are stateless: every call performs exactly one attempt and
/// must return within `budget`.
pub trait LocationProvider: Send + Sync {
    /// Stable identifier, also used as the candidate's `method`.
    fn id(&self) -> &str;

    fn locate(&self, budget: Duration) -> Result<LocationCandidate, ProviderError>;
}

/// Join the present, non-blank parts with ", ". `None` when nothing is left.
fn compose_address(parts: &[Option<&str>]) -> Option<String> {
    let present: Vec<&str> = parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join(", "))
    }
}

fn valid_coords(lat: Option<f64>, lon: Option<f64>) -> (Option<f64>, Option<f64>) {
    (
        lat.filter(|v| (-90.0..=90.0).contains(v)),
        lon.filter(|v| (-180.0..=180.0).contains(v)),
    )
}

/// A candidate with neither coordinates nor an address says nothing about location.
fn ensure_usable(candidate: LocationCandidate) -> Result<LocationCandidate, ProviderError> {
    if candidate.latitude.is_none() && candidate.longitude.is_none() && candidate.address.is_none() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(candidate)
}

// ─── ipinfo.io (geocoder) ───────────────────────────────────────

pub const GEOCODER_METHOD: &str = "Geocoder IP";

#[derive(Deserialize, Debug, Default)]
struct IpinfoResponse {
    loc: Option<String>,
    city: Option<String>,
    region: Option<String>,
    country: Option<String>,
    org: Option<String>,
    timezone: Option<String>,
    #[serde(default)]
    bogon: bool,
}

/// Parse ipinfo's `"lat,lon"` pair.
fn parse_loc(loc: &str) -> Option<(f64, f64)> {
    let (lat, lon) = loc.split_once(',')?;
    Some((lat.trim().parse().ok()?, lon.trim().parse().ok()?))
}

fn normalize_ipinfo(r: IpinfoResponse) -> Result<LocationCandidate, ProviderError> {
    if r.bogon {
        return Err(ProviderError::Rejected("bogon address".into()));
    }

    let (lat, lon) = match r.loc.as_deref().and_then(parse_loc) {
        Some((lat, lon)) => valid_coords(Some(lat), Some(lon)),
        None => (None, None),
    };

    let candidate = LocationCandidate::new(GEOCODER_METHOD)
        .with_coords(lat, lon)
        .with_address(compose_address(&[
            r.city.as_deref(),
            r.region.as_deref(),
            r.country.as_deref(),
        ]))
        .with_accuracy(Some("City level".into()))
        .with_extra("org", r.org)
        .with_extra("timezone", r.timezone);

    ensure_usable(candidate)
}

/// IP geolocation through ipinfo.io, resolving the caller's own address.
pub struct GeocoderIpProvider {
    endpoint: String,
}

impl GeocoderIpProvider {
    pub fn new() -> Self {
        Self::with_endpoint("https://ipinfo.io/json")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for GeocoderIpProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for GeocoderIpProvider {
    fn id(&self) -> &str {
        GEOCODER_METHOD
    }

    fn locate(&self, budget: Duration) -> Result<LocationCandidate, ProviderError> {
        let r: IpinfoResponse = http::get_json(&self.endpoint, budget)?;
        normalize_ipinfo(r)
    }
}

// ─── ip-api.com ─────────────────────────────────────────────────

pub const IP_API_METHOD: &str = "IP-API Service";

#[derive(Deserialize, Debug, Default)]
struct IpApiResponse {
    status: Option<String>,
    message: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    #[serde(rename = "regionName")]
    region_name: Option<String>,
    country: Option<String>,
    isp: Option<String>,
    timezone: Option<String>,
    /// Not part of the documented schema; accepted as either string or number.
    accuracy: Option<serde_json::Value>,
}

fn json_label(v: serde_json::Value) -> Option<String> {
    match v {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn normalize_ip_api(r: IpApiResponse) -> Result<LocationCandidate, ProviderError> {
    if r.status.as_deref() != Some("success") {
        let reason = r
            .message
            .or(r.status)
            .unwrap_or_else(|| "missing status".into());
        return Err(ProviderError::Rejected(reason));
    }

    let (lat, lon) = valid_coords(r.lat, r.lon);
    let candidate = LocationCandidate::new(IP_API_METHOD)
        .with_coords(lat, lon)
        .with_address(compose_address(&[
            r.city.as_deref(),
            r.region_name.as_deref(),
            r.country.as_deref(),
        ]))
        .with_accuracy(r.accuracy.and_then(json_label))
        .with_extra("isp", r.isp)
        .with_extra("timezone", r.timezone);

    ensure_usable(candidate)
}

/// ip-api.com free endpoint (HTTP only on the free tier).
pub struct IpApiProvider {
    endpoint: String,
}

impl IpApiProvider {
    pub fn new() -> Self {
        Self::with_endpoint("http://ip-api.com/json/")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for IpApiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for IpApiProvider {
    fn id(&self) -> &str {
        IP_API_METHOD
    }

    fn locate(&self, budget: Duration) -> Result<LocationCandidate, ProviderError> {
        let r: IpApiResponse = http::get_json(&self.endpoint, budget)?;
        normalize_ip_api(r)
    }
}

// ─── ipapi.co ───────────────────────────────────────────────────

pub const IPAPI_METHOD: &str = "IPAPI Service";

#[derive(Deserialize, Debug, Default)]
struct IpapiResponse {
    #[serde(default)]
    error: bool,
    reason: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    city: Option<String>,
    region: Option<String>,
    country_name: Option<String>,
    org: Option<String>,
    timezone: Option<String>,
}

fn normalize_ipapi(r: IpapiResponse) -> Result<LocationCandidate, ProviderError> {
    if r.error {
        return Err(ProviderError::Rejected(
            r.reason.unwrap_or_else(|| "unspecified error".into()),
        ));
    }

    let (lat, lon) = valid_coords(r.latitude, r.longitude);
    let candidate = LocationCandidate::new(IPAPI_METHOD)
        .with_coords(lat, lon)
        .with_address(compose_address(&[
            r.city.as_deref(),
            r.region.as_deref(),
            r.country_name.as_deref(),
        ]))
        .with_accuracy(Some("ISP level".into()))
        .with_extra("org", r.org)
        .with_extra("timezone", r.timezone);

    ensure_usable(candidate)
}

pub struct IpapiProvider {
    endpoint: String,
}

impl IpapiProvider {
    pub fn new() -> Self {
        Self::with_endpoint("https://ipapi.co/json/")
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for IpapiProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationProvider for IpapiProvider {
    fn id(&self) -> &str {
        IPAPI_METHOD
    }

    fn locate(&self, budget: Duration) -> Result<LocationCandidate, ProviderError> {
        let r: IpapiResponse = http::get_json(&self.endpoint, budget)?;
        normalize_ipapi(r)
    }
}

// ─── WiFi scan heuristic ────────────────────────────────────────

pub const WIFI_SCAN_METHOD: &str = "WiFi Scan";

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Kills and reaps the child on drop unless it has already been waited on.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn wait_until(&mut self, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
        loop {
            if let Some(status) = self.child.try_wait()? {
                self.reaped = true;
                return Ok(Some(status));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

fn count_networks(scan_output: &str) -> usize {
    scan_output.lines().filter(|l| l.contains("ESSID:")).count()
}

/// Counts visible wireless networks with `iwlist scan`.
///
/// Yields no coordinates: the candidate only records that a scan succeeded.
pub struct WifiScanProvider {
    program: PathBuf,
    args: Vec<String>,
}

impl WifiScanProvider {
    /// Locate `iwlist` on this host. `None` when the platform or tool is missing.
    pub fn detect() -> Option<Self> {
        if !cfg!(target_os = "linux") {
            return None;
        }
        find_program("iwlist").map(|program| Self::with_command(program, ["scan"]))
    }

    pub fn with_command<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

impl LocationProvider for WifiScanProvider {
    fn id(&self) -> &str {
        WIFI_SCAN_METHOD
    }

    fn locate(&self, budget: Duration) -> Result<LocationCandidate, ProviderError> {
        let deadline = Instant::now() + budget;

        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProviderError::NotSupported(format!("{}: {}", self.program.display(), e)))?;
        let mut guard = ChildGuard { child, reaped: false };

        // Drain stdout on a side thread so a chatty scan cannot fill the pipe.
        // A grandchild may inherit the pipe and hold it open past the scan's
        // exit, so the result is read back under the same deadline.
        let reader = guard.child.stdout.take().map(|mut out| {
            let (tx, rx) = mpsc::channel();
            thread::spawn(move || {
                let mut buf = String::new();
                let _ = out.read_to_string(&mut buf);
                let _ = tx.send(buf);
            });
            rx
        });

        let status = guard
            .wait_until(deadline)
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let Some(status) = status else {
            drop(guard);
            return Err(ProviderError::Timeout(budget));
        };

        let output = match reader {
            Some(rx) => match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                Ok(buf) => buf,
                Err(RecvTimeoutError::Timeout) => return Err(ProviderError::Timeout(budget)),
                Err(RecvTimeoutError::Disconnected) => String::new(),
            },
            None => String::new(),
        };
        if !status.success() {
            return Err(ProviderError::Rejected(format!("scan exited with {}", status)));
        }

        match count_networks(&output) {
            0 => Err(ProviderError::EmptyResponse),
            n => Ok(LocationCandidate::new(WIFI_SCAN_METHOD).with_extra(
                "note",
                Some(format!(
                    "{} network(s) detected; WiFi geolocation is not available on this host",
                    n
                )),
            )),
        }
    }
}

/// Search `PATH`, then the sbin directories where wireless tools usually live.
fn find_program(name: &str) -> Option<PathBuf> {
    let mut dirs: Vec<PathBuf> = std::env::var_os("PATH")
        .map(|p| std::env::split_paths(&p).collect())
        .unwrap_or_default();
    dirs.extend(["/sbin", "/usr/sbin", "/usr/local/sbin"].map(PathBuf::from));

    dirs.iter()
        .map(|d| d.join(name))
        .find(|p| is_executable(p))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
