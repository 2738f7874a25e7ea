//! Static host inventory: OS identity, CPU, memory, disks, network interfaces.
//!
//! Every field is a one-shot, best-effort read. Nothing here fails: values the
//! platform does not expose are reported as `None`.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::net::IpAddr;
use sysinfo::{Disks, Networks, System};

#[derive(Debug, Clone, Serialize)]
pub struct HostInventory {
    pub system: SystemInfo,
    pub cpu: CpuInfo,
    pub memory: MemoryInfo,
    pub disks: Vec<DiskInfo>,
    pub network: Vec<InterfaceInfo>,
    /// Local boot time, `YYYY/MM/DD HH:MM:SS`.
    pub boot_time: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub platform: Option<String>,
    pub system: Option<String>,
    pub node: Option<String>,
    pub release: Option<String>,
    pub version: Option<String>,
    pub machine: String,
    /// Pointer width of this build, e.g. `64bit`.
    pub architecture: String,
    pub processor: Option<String>,
    pub hostname: Option<String>,
    pub mac_address: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CpuInfo {
    pub physical_cores: Option<usize>,
    pub total_cores: usize,
    pub current_frequency_mhz: Option<u64>,
    pub cpu_usage_percent: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiskInfo {
    pub device: String,
    pub mountpoint: String,
    pub file_system: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub free_bytes: u64,
    pub used_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceInfo {
    pub interface: String,
    pub mac_address: Option<String>,
    pub addresses: Vec<InterfaceAddress>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceAddress {
    pub ip: IpAddr,
    pub prefix: u8,
}

/// Percentage with one decimal. 0 when `total` is 0.
fn percent(used: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let p = used as f64 / total as f64 * 100.0;
    (p.clamp(0.0, 100.0) * 10.0).round() / 10.0
}

fn format_boot_time(epoch_secs: u64) -> Option<String> {
    let secs = i64::try_from(epoch_secs).ok()?;
    if secs == 0 {
        return None;
    }
    let dt = DateTime::from_timestamp(secs, 0)?.with_timezone(&Local);
    Some(dt.format("%Y/%m/%d %H:%M:%S").to_string())
}

/// Collect a full inventory. Blocks for about one CPU sampling interval.
pub fn collect() -> HostInventory {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.refresh_cpu_all();
    // Usage is a delta between two refreshes.
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let network = collect_network();
    let mac_address = network.iter().find_map(|i| i.mac_address.clone());

    HostInventory {
        system: collect_system(&sys, mac_address),
        cpu: collect_cpu(&sys),
        memory: collect_memory(&sys),
        disks: collect_disks(),
        network,
        boot_time: format_boot_time(System::boot_time()),
    }
}

fn architecture() -> String {
    format!("{}bit", usize::BITS)
}

fn collect_system(sys: &System, mac_address: Option<String>) -> SystemInfo {
    let hostname = hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().to_string());

    SystemInfo {
        platform: System::long_os_version(),
        system: System::name(),
        node: System::host_name(),
        release: System::kernel_version(),
        version: System::os_version(),
        machine: std::env::consts::ARCH.to_string(),
        architecture: architecture(),
        processor: sys
            .cpus()
            .first()
            .map(|c| c.brand().trim().to_string())
            .filter(|b| !b.is_empty()),
        hostname,
        mac_address,
    }
}

fn collect_cpu(sys: &System) -> CpuInfo {
    let cpus = sys.cpus();
    let current_frequency_mhz = if cpus.is_empty() {
        None
    } else {
        let avg = cpus.iter().map(|c| c.frequency()).sum::<u64>() / cpus.len() as u64;
        Some(avg).filter(|f| *f > 0)
    };

    CpuInfo {
        physical_cores: System::physical_core_count(),
        total_cores: cpus.len(),
        current_frequency_mhz,
        cpu_usage_percent: sys.global_cpu_usage(),
    }
}

fn collect_memory(sys: &System) -> MemoryInfo {
    let total_bytes = sys.total_memory();
    let used_bytes = sys.used_memory();
    MemoryInfo {
        total_bytes,
        available_bytes: sys.available_memory(),
        used_bytes,
        used_percent: percent(used_bytes, total_bytes),
    }
}

/// Partitions that report no size (inaccessible or pseudo filesystems) are skipped.
fn collect_disks() -> Vec<DiskInfo> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|d| d.total_space() > 0)
        .map(|d| {
            let total = d.total_space();
            let free = d.available_space().min(total);
            let used = total - free;
            DiskInfo {
                device: d.name().to_string_lossy().to_string(),
                mountpoint: d.mount_point().display().to_string(),
                file_system: d.file_system().to_string_lossy().to_string(),
                total_bytes: total,
                used_bytes: used,
                free_bytes: free,
                used_percent: percent(used, total),
            }
        })
        .collect()
}

fn collect_network() -> Vec<InterfaceInfo> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<InterfaceInfo> = networks
        .iter()
        .map(|(name, data)| {
            let mac = data.mac_address();
            InterfaceInfo {
                interface: name.clone(),
                mac_address: (!mac.is_unspecified()).then(|| mac.to_string()),
                addresses: data
                    .ip_networks()
                    .iter()
                    .map(|n| InterfaceAddress { ip: n.addr, prefix: n.prefix })
                    .collect(),
            }
        })
        .collect();
    interfaces.sort_by(|a, b| a.interface.cmp(&b.interface));
    interfaces
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 3), 33.3);
        assert_eq!(percent(5, 4), 100.0);
    }

    #[test]
    fn test_format_boot_time() {
        assert!(format_boot_time(0).is_none());
        let s = format_boot_time(1_700_000_000).unwrap();
        // YYYY/MM/DD HH:MM:SS in local time
        assert_eq!(s.len(), 19);
        assert_eq!(&s[4..5], "/");
        assert_eq!(&s[13..14], ":");
    }

    #[test]
    fn test_collect_smoke() {
        let inv = collect();
        assert!(inv.cpu.total_cores >= 1);
        assert!(inv.memory.total_bytes > 0);
        assert!(!inv.system.machine.is_empty());
        assert!(["32bit", "64bit"].contains(&inv.system.architecture.as_str()));
        for d in &inv.disks {
            assert_eq!(d.used_bytes + d.free_bytes, d.total_bytes);
        }
        let json = serde_json::to_value(&inv).unwrap();
        assert!(json["network"].is_array());
    }
}
