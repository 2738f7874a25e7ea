//! Report assembly, text rendering, and JSON persistence.

use crate::inventory::HostInventory;
use crate::ip::{IpLocation, LookupError, PublicIp};
use crate::location::{LocationCandidate, LocationResolution};
use chrono::{DateTime, Local};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REPORT_FILE: &str = "device_info_log.json";

const RULE_WIDTH: usize = 80;
const SECTION_WIDTH: usize = 50;
const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Everything gathered in one run.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceReport {
    pub timestamp: DateTime<Local>,
    pub system_info: HostInventory,
    pub public_ip: PublicIp,
    #[serde(serialize_with = "serialize_ip_location")]
    pub ip_location: Result<IpLocation, LookupError>,
    pub gps_location: LocationResolution,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum IpLocationView<'a> {
    Located(&'a IpLocation),
    Unavailable { reason: String },
}

fn serialize_ip_location<S: Serializer>(
    value: &Result<IpLocation, LookupError>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Ok(loc) => IpLocationView::Located(loc).serialize(s),
        Err(e) => IpLocationView::Unavailable { reason: e.to_string() }.serialize(s),
    }
}

impl DeviceReport {
    pub fn new(
        system_info: HostInventory,
        public_ip: PublicIp,
        ip_location: Result<IpLocation, LookupError>,
        gps_location: LocationResolution,
    ) -> Self {
        Self {
            timestamp: Local::now(),
            system_info,
            public_ip,
            ip_location,
            gps_location,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Writes reports as pretty-printed JSON.
pub struct ReportSink {
    path: PathBuf,
}

impl ReportSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn persist(&self, report: &DeviceReport) -> Result<(), SinkError> {
        let json = serde_json::to_string_pretty(report)?;
        let write_err = |source| SinkError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(&self.path, json).map_err(write_err)
    }
}

// ─── Text rendering ─────────────────────────────────────────────

fn gib(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

fn or_na<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_else(|| "N/A".into())
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f, "\n{}:", title)?;
    writeln!(f, "{}", "-".repeat(SECTION_WIDTH))
}

fn field(f: &mut fmt::Formatter<'_>, indent: usize, key: &str, value: impl fmt::Display) -> fmt::Result {
    writeln!(f, "{:indent$}{}: {}", "", key, value, indent = indent)
}

fn render_candidate(f: &mut fmt::Formatter<'_>, c: &LocationCandidate, indent: usize) -> fmt::Result {
    field(f, indent, "Method", &c.method)?;
    if let Some(lat) = c.latitude {
        field(f, indent, "Latitude", lat)?;
    }
    if let Some(lon) = c.longitude {
        field(f, indent, "Longitude", lon)?;
    }
    if let Some(addr) = &c.address {
        field(f, indent, "Address", addr)?;
    }
    if let Some(acc) = &c.accuracy {
        field(f, indent, "Accuracy", acc)?;
    }
    for (k, v) in &c.extra {
        field(f, indent, &title_case(k), v)?;
    }
    Ok(())
}

/// "mac_address" → "Mac Address"
fn title_case(key: &str) -> String {
    key.split(['_', '-'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn map_link(lat: f64, lon: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", lat, lon)
}

impl fmt::Display for DeviceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let report = self;
        let rule = "=".repeat(RULE_WIDTH);
        writeln!(f, "{}", rule)?;
        writeln!(f, "{:^width$}", "DEVICE INFORMATION", width = RULE_WIDTH)?;
        writeln!(f, "{}", rule)?;
        field(f, 0, "Timestamp", report.timestamp.format("%Y-%m-%d %H:%M:%S"))?;

        let inv = &report.system_info;
        let sys = &inv.system;
        section(f, "SYSTEM")?;
        field(f, 2, "Platform", or_na(sys.platform.as_deref()))?;
        field(f, 2, "System", or_na(sys.system.as_deref()))?;
        field(f, 2, "Node", or_na(sys.node.as_deref()))?;
        field(f, 2, "Release", or_na(sys.release.as_deref()))?;
        field(f, 2, "Version", or_na(sys.version.as_deref()))?;
        field(f, 2, "Machine", &sys.machine)?;
        field(f, 2, "Architecture", &sys.architecture)?;
        field(f, 2, "Processor", or_na(sys.processor.as_deref()))?;
        field(f, 2, "Hostname", or_na(sys.hostname.as_deref()))?;
        field(f, 2, "Mac Address", or_na(sys.mac_address.as_deref()))?;

        let cpu = &inv.cpu;
        section(f, "CPU")?;
        field(f, 2, "Physical Cores", or_na(cpu.physical_cores))?;
        field(f, 2, "Total Cores", cpu.total_cores)?;
        field(f, 2, "Current Frequency", or_na(cpu.current_frequency_mhz.map(|mhz| format!("{:.2}Mhz", mhz as f64))))?;
        field(f, 2, "Cpu Usage", format!("{:.1}%", cpu.cpu_usage_percent))?;

        let mem = &inv.memory;
        section(f, "MEMORY")?;
        field(f, 2, "Total", gib(mem.total_bytes))?;
        field(f, 2, "Available", gib(mem.available_bytes))?;
        field(f, 2, "Used", gib(mem.used_bytes))?;
        field(f, 2, "Percentage", format!("{:.1}%", mem.used_percent))?;

        section(f, "DISKS")?;
        for d in &inv.disks {
            field(f, 2, "Device", &d.device)?;
            field(f, 4, "Mountpoint", &d.mountpoint)?;
            field(f, 4, "File System", &d.file_system)?;
            field(f, 4, "Total Size", gib(d.total_bytes))?;
            field(f, 4, "Used", gib(d.used_bytes))?;
            field(f, 4, "Free", gib(d.free_bytes))?;
            field(f, 4, "Percentage", format!("{:.1}%", d.used_percent))?;
        }

        section(f, "NETWORK")?;
        field(f, 2, "Public IP", &report.public_ip)?;
        for iface in inv.network.iter().filter(|i| i.mac_address.is_some() || !i.addresses.is_empty()) {
            writeln!(f, "  Interface {}:", iface.interface)?;
            if let Some(mac) = &iface.mac_address {
                field(f, 4, "Mac Address", mac)?;
            }
            for a in &iface.addresses {
                field(f, 4, "Ip Address", format!("{}/{}", a.ip, a.prefix))?;
            }
        }
        writeln!(f)?;
        field(f, 2, "Boot Time", or_na(inv.boot_time.as_deref()))?;

        section(f, "IP LOCATION")?;
        match &report.ip_location {
            Ok(loc) => {
                field(f, 2, "Country", or_na(loc.country.as_deref()))?;
                field(f, 2, "Region", or_na(loc.region.as_deref()))?;
                field(f, 2, "City", or_na(loc.city.as_deref()))?;
                field(f, 2, "Zip", or_na(loc.zip.as_deref()))?;
                field(f, 2, "Latitude", or_na(loc.latitude))?;
                field(f, 2, "Longitude", or_na(loc.longitude))?;
                field(f, 2, "Timezone", or_na(loc.timezone.as_deref()))?;
                field(f, 2, "Isp", or_na(loc.isp.as_deref()))?;
            }
            Err(e) => {
                writeln!(f, "  Unable to determine IP location ({})", e)?;
            }
        }

        section(f, "GPS-STYLE LOCATION")?;
        match report.gps_location.report() {
            Some(r) => {
                writeln!(f, "  PRIMARY LOCATION:")?;
                render_candidate(f, r.primary(), 4)?;
                if let Some((lat, lon)) = r.primary().coords() {
                    writeln!(f, "\n  Map link:")?;
                    writeln!(f, "    {}", map_link(lat, lon))?;
                    writeln!(f, "  Coordinates: {}, {}", lat, lon)?;
                }
                if !r.alternatives().is_empty() {
                    writeln!(f, "\n  ALTERNATIVE SOURCES ({}):", r.alternatives().len())?;
                    for (i, alt) in r.alternatives().iter().enumerate() {
                        writeln!(f, "    Source {}: {}", i + 1, alt.method)?;
                        if let Some((lat, lon)) = alt.coords() {
                            writeln!(f, "      Coordinates: {}, {}", lat, lon)?;
                        }
                    }
                }
                field(f, 2, "Total Methods", r.total_methods())?;
            }
            None => {
                writeln!(f, "  {}", report.gps_location)?;
            }
        }

        writeln!(f, "\n{}", rule)
    }
}

/// Human-readable rendering of the whole report.
pub fn render(report: &DeviceReport) -> String {
    report.to_string()
}
