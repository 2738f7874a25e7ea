//! Core types for the location subsystem.

use crate::http::HttpError;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A single provider's location guess, possibly partial.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCandidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    /// Human-readable address composed by the provider (e.g. "Paris, Île-de-France, France")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Identifier of the provider that produced this candidate.
    pub method: String,
    /// Qualitative accuracy label (e.g. "City level")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<String>,
    /// Provider-specific fields (isp, timezone, org, note), in discovery order.
    #[serde(flatten)]
    pub extra: IndexMap<String, String>,
}

impl LocationCandidate {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            latitude: None,
            longitude: None,
            address: None,
            method: method.into(),
            accuracy: None,
            extra: IndexMap::new(),
        }
    }

    pub fn with_coords(mut self, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.address = address;
        self
    }

    pub fn with_accuracy(mut self, accuracy: Option<String>) -> Self {
        self.accuracy = accuracy;
        self
    }

    /// Record a provider-specific field. Absent or blank values are skipped.
    pub fn with_extra(mut self, key: &str, value: Option<String>) -> Self {
        if let Some(v) = value.filter(|v| !v.trim().is_empty()) {
            self.extra.insert(key.to_string(), v);
        }
        self
    }

    /// Both coordinates, if the provider reported them.
    pub fn coords(&self) -> Option<(f64, f64)> {
        Some((self.latitude?, self.longitude?))
    }
}

/// Primary candidate plus every other successful candidate, in registry order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationReport {
    #[serde(rename = "primary_location")]
    primary: LocationCandidate,
    #[serde(rename = "alternative_locations")]
    alternatives: Vec<LocationCandidate>,
    total_methods: usize,
}

impl LocationReport {
    pub(crate) fn new(primary: LocationCandidate, alternatives: Vec<LocationCandidate>) -> Self {
        let total_methods = 1 + alternatives.len();
        Self { primary, alternatives, total_methods }
    }

    pub fn primary(&self) -> &LocationCandidate {
        &self.primary
    }

    pub fn alternatives(&self) -> &[LocationCandidate] {
        &self.alternatives
    }

    pub fn total_methods(&self) -> usize {
        self.total_methods
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LocationResolution {
    Located(LocationReport),
    /// Every provider failed. A valid outcome, not an error.
    NoLocationAvailable,
}

impl LocationResolution {
    pub fn report(&self) -> Option<&LocationReport> {
        match self {
            Self::Located(report) => Some(report),
            Self::NoLocationAvailable => None,
        }
    }

    pub fn is_located(&self) -> bool {
        matches!(self, Self::Located(_))
    }
}

impl fmt::Display for LocationResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Located(r) => write!(f, "{} ({} method(s))", r.primary.method, r.total_methods),
            Self::NoLocationAvailable => write!(f, "No geolocation method available"),
        }
    }
}

/// Why a provider produced no candidate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("invalid response: {0}")]
    Decode(String),
    /// The provider answered but flagged its own failure in the payload.
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("response carried no usable location data")]
    EmptyResponse,
    #[error("timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("not supported on this host: {0}")]
    NotSupported(String),
    #[error("provider panicked")]
    Panicked,
}

impl From<HttpError> for ProviderError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Transport(msg) => Self::Transport(msg),
            HttpError::Status(code) => Self::Status(code),
            HttpError::Decode(msg) => Self::Decode(msg),
        }
    }
}
