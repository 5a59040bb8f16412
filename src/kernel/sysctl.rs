//! Kernel tunable access
//!
//! Reads and writes `vm.*` sysctl values through `/proc/sys`, and snapshots
//! the live virtual-memory configuration into a [`VmState`].

use crate::error::{Result, VmTuneError};
use serde::{Deserialize, Serialize};
use std::fmt;
#[cfg(target_os = "linux")]
use tracing::debug;

/// Every tunable the tool manages
///
/// `SwapSizeMb` is not a sysctl but participates in diffing and planning
/// alongside the rest; `sysctl_key` returns `None` for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tunable {
    SwapSizeMb,
    Swappiness,
    VfsCachePressure,
    DirtyRatio,
    DirtyBackgroundRatio,
    DirtyExpireCentisecs,
    DirtyWritebackCentisecs,
    MinFreeKbytes,
    PageCluster,
    OvercommitMemory,
    OvercommitRatio,
}

impl Tunable {
    /// All managed tunables, in apply order within their phase
    pub const ALL: [Tunable; 11] = [
        Tunable::SwapSizeMb,
        Tunable::Swappiness,
        Tunable::VfsCachePressure,
        Tunable::DirtyRatio,
        Tunable::DirtyBackgroundRatio,
        Tunable::DirtyExpireCentisecs,
        Tunable::DirtyWritebackCentisecs,
        Tunable::MinFreeKbytes,
        Tunable::PageCluster,
        Tunable::OvercommitMemory,
        Tunable::OvercommitRatio,
    ];

    /// The exact sysctl key, or None for the swap pseudo-tunable
    pub fn sysctl_key(&self) -> Option<&'static str> {
        match self {
            Tunable::SwapSizeMb => None,
            Tunable::Swappiness => Some("vm.swappiness"),
            Tunable::VfsCachePressure => Some("vm.vfs_cache_pressure"),
            Tunable::DirtyRatio => Some("vm.dirty_ratio"),
            Tunable::DirtyBackgroundRatio => Some("vm.dirty_background_ratio"),
            Tunable::DirtyExpireCentisecs => Some("vm.dirty_expire_centisecs"),
            Tunable::DirtyWritebackCentisecs => Some("vm.dirty_writeback_centisecs"),
            Tunable::MinFreeKbytes => Some("vm.min_free_kbytes"),
            Tunable::PageCluster => Some("vm.page_cluster"),
            Tunable::OvercommitMemory => Some("vm.overcommit_memory"),
            Tunable::OvercommitRatio => Some("vm.overcommit_ratio"),
        }
    }

    /// Overcommit tunables only apply in the final phase, after swap exists
    pub fn is_overcommit(&self) -> bool {
        matches!(self, Tunable::OvercommitMemory | Tunable::OvercommitRatio)
    }

    /// Stock kernel default, used when a key is absent on this kernel
    ///
    /// `min_free_kbytes` is autoscaled at boot; 65536 is a mid-range value
    /// for hosts with a few GB of RAM.
    pub fn kernel_default(&self) -> u64 {
        match self {
            Tunable::SwapSizeMb => 0,
            Tunable::Swappiness => 60,
            Tunable::VfsCachePressure => 100,
            Tunable::DirtyRatio => 20,
            Tunable::DirtyBackgroundRatio => 10,
            Tunable::DirtyExpireCentisecs => 3000,
            Tunable::DirtyWritebackCentisecs => 500,
            Tunable::MinFreeKbytes => 65536,
            Tunable::PageCluster => 3,
            Tunable::OvercommitMemory => 0,
            Tunable::OvercommitRatio => 50,
        }
    }
}

impl fmt::Display for Tunable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sysctl_key() {
            Some(key) => write!(f, "{}", key),
            None => write!(f, "swap_size_mb"),
        }
    }
}

/// Read a sysctl value as a string
#[cfg(target_os = "linux")]
pub fn read_sysctl(key: &str) -> Result<String> {
    let path = format!("/proc/sys/{}", key.replace('.', "/"));
    std::fs::read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| VmTuneError::sysctl(key, e.to_string()))
}

#[cfg(not(target_os = "linux"))]
pub fn read_sysctl(key: &str) -> Result<String> {
    Err(VmTuneError::UnsupportedOperation(format!(
        "sysctl read of '{}' on non-Linux platform",
        key
    )))
}

/// Read a sysctl value as a u64
pub fn read_sysctl_u64(key: &str) -> Result<u64> {
    let raw = read_sysctl(key)?;
    // Some keys (dirty ratios under bytes-mode kernels) may carry extra
    // fields; take the first whitespace-separated token.
    let token = raw.split_whitespace().next().unwrap_or("");
    token.parse::<u64>().map_err(|_| VmTuneError::SysctlParse {
        key: key.to_string(),
        value: raw,
    })
}

/// Read a sysctl value as a u64, falling back to `default` when the key does
/// not exist on this kernel
///
/// Keys like `vm.page_cluster` are config-dependent; a missing key is a
/// snapshot gap, not a fatal condition. Other read errors still propagate.
#[cfg(target_os = "linux")]
pub fn read_sysctl_u64_or(key: &str, default: u64) -> Result<u64> {
    let path = format!("/proc/sys/{}", key.replace('.', "/"));
    match std::fs::read_to_string(&path) {
        Ok(raw) => {
            let token = raw.split_whitespace().next().unwrap_or("");
            token.parse::<u64>().map_err(|_| VmTuneError::SysctlParse {
                key: key.to_string(),
                value: raw.trim().to_string(),
            })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(key, default, "sysctl key absent on this kernel, using default");
            Ok(default)
        }
        Err(e) => Err(VmTuneError::sysctl(key, e.to_string())),
    }
}

#[cfg(not(target_os = "linux"))]
pub fn read_sysctl_u64_or(key: &str, _default: u64) -> Result<u64> {
    Err(VmTuneError::UnsupportedOperation(format!(
        "sysctl read of '{}' on non-Linux platform",
        key
    )))
}

/// Write a sysctl value to the live kernel interface
#[cfg(target_os = "linux")]
pub fn write_sysctl(key: &str, value: u64) -> Result<()> {
    let path = format!("/proc/sys/{}", key.replace('.', "/"));
    std::fs::write(&path, format!("{}\n", value))
        .map_err(|e| VmTuneError::sysctl(key, e.to_string()))
}

#[cfg(not(target_os = "linux"))]
pub fn write_sysctl(key: &str, _value: u64) -> Result<()> {
    Err(VmTuneError::UnsupportedOperation(format!(
        "sysctl write of '{}' on non-Linux platform",
        key
    )))
}

/// Snapshot of the live virtual-memory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmState {
    /// Total active swap in MB, summed over all swap areas
    pub swap_size_mb: u64,
    pub swappiness: u64,
    pub vfs_cache_pressure: u64,
    pub dirty_ratio: u64,
    pub dirty_background_ratio: u64,
    pub dirty_expire_centisecs: u64,
    pub dirty_writeback_centisecs: u64,
    pub min_free_kbytes: u64,
    pub page_cluster: u64,
    pub overcommit_memory: u64,
    pub overcommit_ratio: u64,
}

impl VmState {
    /// Read the current state from the running kernel
    ///
    /// Keys missing on this kernel build are filled in from
    /// [`Tunable::kernel_default`] rather than failing the snapshot.
    pub fn read_current() -> Result<Self> {
        let read = |t: Tunable| -> Result<u64> {
            match t.sysctl_key() {
                Some(key) => read_sysctl_u64_or(key, t.kernel_default()),
                None => Ok(t.kernel_default()),
            }
        };
        Ok(VmState {
            swap_size_mb: crate::kernel::swap::total_swap_mb()?,
            swappiness: read(Tunable::Swappiness)?,
            vfs_cache_pressure: read(Tunable::VfsCachePressure)?,
            dirty_ratio: read(Tunable::DirtyRatio)?,
            dirty_background_ratio: read(Tunable::DirtyBackgroundRatio)?,
            dirty_expire_centisecs: read(Tunable::DirtyExpireCentisecs)?,
            dirty_writeback_centisecs: read(Tunable::DirtyWritebackCentisecs)?,
            min_free_kbytes: read(Tunable::MinFreeKbytes)?,
            page_cluster: read(Tunable::PageCluster)?,
            overcommit_memory: read(Tunable::OvercommitMemory)?,
            overcommit_ratio: read(Tunable::OvercommitRatio)?,
        })
    }

    /// Value of one tunable in this snapshot
    pub fn value_of(&self, tunable: Tunable) -> u64 {
        match tunable {
            Tunable::SwapSizeMb => self.swap_size_mb,
            Tunable::Swappiness => self.swappiness,
            Tunable::VfsCachePressure => self.vfs_cache_pressure,
            Tunable::DirtyRatio => self.dirty_ratio,
            Tunable::DirtyBackgroundRatio => self.dirty_background_ratio,
            Tunable::DirtyExpireCentisecs => self.dirty_expire_centisecs,
            Tunable::DirtyWritebackCentisecs => self.dirty_writeback_centisecs,
            Tunable::MinFreeKbytes => self.min_free_kbytes,
            Tunable::PageCluster => self.page_cluster,
            Tunable::OvercommitMemory => self.overcommit_memory,
            Tunable::OvercommitRatio => self.overcommit_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysctl_keys_are_exact() {
        assert_eq!(Tunable::Swappiness.sysctl_key(), Some("vm.swappiness"));
        assert_eq!(
            Tunable::DirtyBackgroundRatio.sysctl_key(),
            Some("vm.dirty_background_ratio")
        );
        assert_eq!(Tunable::SwapSizeMb.sysctl_key(), None);
        assert_eq!(
            Tunable::OvercommitMemory.sysctl_key(),
            Some("vm.overcommit_memory")
        );
    }

    #[test]
    fn test_overcommit_classification() {
        assert!(Tunable::OvercommitMemory.is_overcommit());
        assert!(Tunable::OvercommitRatio.is_overcommit());
        assert!(!Tunable::Swappiness.is_overcommit());
        assert!(!Tunable::SwapSizeMb.is_overcommit());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_read_live_swappiness() {
        // /proc/sys/vm/swappiness is world-readable on any Linux kernel.
        let value = read_sysctl_u64("vm.swappiness").unwrap();
        assert!(value <= 200);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_missing_key_falls_back_to_default() {
        let value = read_sysctl_u64_or("vm.no_such_tunable_here", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_present_key_ignores_default() {
        let value = read_sysctl_u64_or("vm.swappiness", 9999).unwrap();
        assert!(value <= 200);
    }

    #[test]
    fn test_kernel_defaults_match_stock_values() {
        assert_eq!(Tunable::Swappiness.kernel_default(), 60);
        assert_eq!(Tunable::PageCluster.kernel_default(), 3);
        assert_eq!(Tunable::OvercommitMemory.kernel_default(), 0);
        assert_eq!(Tunable::OvercommitRatio.kernel_default(), 50);
    }

    #[test]
    fn test_value_of_covers_every_tunable() {
        let state = VmState {
            swap_size_mb: 1,
            swappiness: 2,
            vfs_cache_pressure: 3,
            dirty_ratio: 4,
            dirty_background_ratio: 5,
            dirty_expire_centisecs: 6,
            dirty_writeback_centisecs: 7,
            min_free_kbytes: 8,
            page_cluster: 9,
            overcommit_memory: 10,
            overcommit_ratio: 11,
        };
        let values: Vec<u64> = Tunable::ALL.iter().map(|t| state.value_of(*t)).collect();
        assert_eq!(values, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11]);
    }
}
