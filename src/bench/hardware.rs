//! Hardware identification
//!
//! Detects CPU, memory, and the block device backing the root filesystem.
//! Disk class (SSD vs HDD) comes from the block device's rotational queue
//! attribute; the I/O profile (physical vs virtualized-and-IOPS-limited) is
//! classified once, after the disk benchmark, and consumed by table lookups
//! downstream.

use serde::{Deserialize, Serialize};
use std::path::Path;
use sysinfo::System;

/// Disk media class, selected once by the collector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskClass {
    /// Non-rotational media (SSD/NVMe)
    Ssd,
    /// Rotational media
    Hdd,
}

impl DiskClass {
    /// True for rotating media
    pub fn is_rotational(&self) -> bool {
        matches!(self, DiskClass::Hdd)
    }
}

/// How the storage path behaves under load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IoProfile {
    /// Directly attached storage with consistent throughput and IOPS
    Physical,
    /// High sequential throughput but throttled IOPS, typical of a guest
    /// backed by fast host media behind an I/O limiter
    VirtualizedLowIops,
}

/// Hardware snapshot, created once per run and immutable thereafter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// Logical CPU count
    pub cpu_core_count: usize,
    /// Maximum CPU frequency in MHz (0 when undetectable)
    pub cpu_max_frequency_mhz: u64,
    /// CPU model name (advisory)
    pub cpu_model: String,
    /// Total physical memory in MB
    pub total_ram_mb: u64,
    /// Memory currently available in MB
    pub available_ram_mb: u64,
    /// Memory type/speed hint, e.g. from DMI (advisory)
    pub memory_kind: String,
    /// Block device backing the root filesystem, e.g. "sda" or "nvme0n1"
    pub disk_device: String,
    /// SSD or HDD, from the rotational queue attribute
    pub disk_class: DiskClass,
    /// Physical or virtualized-IOPS-limited storage path
    pub io_profile: IoProfile,
    /// Hypervisor fingerprint present in DMI strings
    pub virtualization_suspected: bool,
}

impl HardwareProfile {
    /// Detect the hardware profile for the host
    ///
    /// The I/O profile starts as `Physical`; the collector refines it with
    /// [`HardwareProfile::classify_io`] once disk metrics exist.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        let cpus = sys.cpus();
        let cpu_model = cpus
            .first()
            .map(|c| c.brand().to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let cpu_max_frequency_mhz = cpus.iter().map(|c| c.frequency()).max().unwrap_or(0);

        let total_ram_mb = sys.total_memory() / (1024 * 1024);
        let available_ram_mb = sys.available_memory() / (1024 * 1024);

        let disk_device = root_block_device().unwrap_or_else(|| "unknown".to_string());
        let disk_class = detect_disk_class(&disk_device);
        let virtualization_suspected = dmi_hypervisor_hint();

        HardwareProfile {
            cpu_core_count: num_cpus::get(),
            cpu_max_frequency_mhz,
            cpu_model,
            total_ram_mb,
            available_ram_mb,
            memory_kind: memory_kind_hint(),
            disk_device,
            disk_class,
            io_profile: IoProfile::Physical,
            virtualization_suspected,
        }
    }

    /// Classify the I/O profile from measured disk behavior
    ///
    /// High sequential throughput paired with low random IOPS means the host
    /// media is fast but an I/O limiter sits in front of it. A DMI hypervisor
    /// hint lowers the IOPS threshold for the same verdict.
    pub fn classify_io(&mut self, seq_read_mb_s: f64, rand_read_iops: f64) {
        let throttled = seq_read_mb_s >= 200.0 && rand_read_iops < 500.0;
        let hinted = self.virtualization_suspected && rand_read_iops < 1000.0;
        self.io_profile = if throttled || hinted {
            IoProfile::VirtualizedLowIops
        } else {
            IoProfile::Physical
        };
    }

    /// True when the storage path is IOPS-limited virtualized storage
    pub fn is_virtualized_low_iops(&self) -> bool {
        self.io_profile == IoProfile::VirtualizedLowIops
    }
}

/// Find the block device backing the root filesystem
fn root_block_device() -> Option<String> {
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();

    // Longest mount-point prefix of "/" is "/" itself; pick the disk mounted
    // there, or fall back to the first listed disk.
    let root = disks
        .iter()
        .find(|d| d.mount_point() == Path::new("/"))
        .or_else(|| disks.iter().next())?;

    let name = root.name().to_string_lossy().to_string();
    Some(base_block_device(&name))
}

/// Strip a partition suffix down to the base block device name
///
/// "/dev/sda2" -> "sda", "/dev/nvme0n1p1" -> "nvme0n1", "/dev/vda1" -> "vda".
pub fn base_block_device(device: &str) -> String {
    let name = device.trim_start_matches("/dev/");

    if name.starts_with("nvme") || name.starts_with("mmcblk") {
        // Partition suffix is "p<digits>"
        if let Some(idx) = name.rfind('p') {
            if name[idx + 1..].chars().all(|c| c.is_ascii_digit())
                && !name[idx + 1..].is_empty()
            {
                return name[..idx].to_string();
            }
        }
        return name.to_string();
    }

    name.trim_end_matches(|c: char| c.is_ascii_digit()).to_string()
}

/// Read the rotational queue attribute for a block device
fn detect_disk_class(device: &str) -> DiskClass {
    #[cfg(target_os = "linux")]
    {
        let path = format!("/sys/block/{}/queue/rotational", device);
        if let Ok(content) = std::fs::read_to_string(&path) {
            if let Ok(rotational) = content.trim().parse::<u8>() {
                return if rotational == 1 {
                    DiskClass::Hdd
                } else {
                    DiskClass::Ssd
                };
            }
        }
        tracing::debug!(device, "rotational attribute unreadable, assuming SSD");
    }
    let _ = device;
    DiskClass::Ssd
}

/// Check DMI strings for a hypervisor fingerprint
fn dmi_hypervisor_hint() -> bool {
    #[cfg(target_os = "linux")]
    {
        for file in ["product_name", "sys_vendor"] {
            let path = format!("/sys/class/dmi/id/{}", file);
            if let Ok(content) = std::fs::read_to_string(&path) {
                let lower = content.to_lowercase();
                if ["kvm", "qemu", "vmware", "virtualbox", "xen", "bochs", "hyper-v"]
                    .iter()
                    .any(|h| lower.contains(h))
                {
                    return true;
                }
            }
        }
    }
    false
}

/// Best-effort memory type hint from DMI; purely advisory
fn memory_kind_hint() -> String {
    #[cfg(target_os = "linux")]
    {
        // dmidecode needs root and is frequently absent; its absence is not
        // an error, the field is advisory.
        if let Ok(output) = std::process::Command::new("dmidecode")
            .args(["-t", "memory"])
            .output()
        {
            if output.status.success() {
                let text = String::from_utf8_lossy(&output.stdout);
                let kind = text
                    .lines()
                    .find_map(|l| l.trim().strip_prefix("Type: "))
                    .unwrap_or("unknown");
                let speed = text
                    .lines()
                    .find_map(|l| l.trim().strip_prefix("Speed: "))
                    .unwrap_or("unknown");
                return format!("{} @ {}", kind.trim(), speed.trim());
            }
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_block_device() {
        assert_eq!(base_block_device("/dev/sda2"), "sda");
        assert_eq!(base_block_device("/dev/vda1"), "vda");
        assert_eq!(base_block_device("/dev/nvme0n1p1"), "nvme0n1");
        assert_eq!(base_block_device("/dev/nvme0n1"), "nvme0n1");
        assert_eq!(base_block_device("/dev/mmcblk0p2"), "mmcblk0");
        assert_eq!(base_block_device("sdb"), "sdb");
    }

    #[test]
    fn test_detect_populates_core_fields() {
        let hw = HardwareProfile::detect();
        assert!(hw.cpu_core_count > 0);
        assert!(hw.total_ram_mb > 0);
    }

    #[test]
    fn test_classify_io_throttled() {
        let mut hw = HardwareProfile::detect();
        hw.virtualization_suspected = false;

        // Fast host media behind an IOPS limiter
        hw.classify_io(450.0, 80.0);
        assert_eq!(hw.io_profile, IoProfile::VirtualizedLowIops);

        // Plain slow HDD: low sequential and low IOPS is not a limiter
        hw.classify_io(120.0, 150.0);
        assert_eq!(hw.io_profile, IoProfile::Physical);

        // Fast SSD all around
        hw.classify_io(520.0, 80_000.0);
        assert_eq!(hw.io_profile, IoProfile::Physical);
    }

    #[test]
    fn test_classify_io_dmi_hint() {
        let mut hw = HardwareProfile::detect();
        hw.virtualization_suspected = true;
        hw.classify_io(150.0, 800.0);
        assert_eq!(hw.io_profile, IoProfile::VirtualizedLowIops);
    }
}
