//! Swap backing store lifecycle
//!
//! Manages a single file-backed swap area: disable, remove, allocate at the
//! target size, format, enable, and register for reboot persistence in
//! /etc/fstab. `mkswap` and `swapon`/`swapoff` are invoked as subprocesses;
//! allocation prefers `fallocate` and falls back to zero-fill on filesystems
//! that reject it.

use crate::error::{IoResultExt, Result, VmTuneError};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

/// One active swap area from /proc/swaps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapDevice {
    pub name: String,
    pub kind: String,
    pub size_mb: u64,
    pub used_mb: u64,
    pub priority: i64,
}

/// List active swap areas
#[cfg(target_os = "linux")]
pub fn active_swaps() -> Result<Vec<SwapDevice>> {
    let content = std::fs::read_to_string("/proc/swaps").with_path("/proc/swaps")?;
    Ok(parse_proc_swaps(&content))
}

#[cfg(not(target_os = "linux"))]
pub fn active_swaps() -> Result<Vec<SwapDevice>> {
    Err(VmTuneError::UnsupportedOperation(
        "swap enumeration on non-Linux platform".to_string(),
    ))
}

/// Parse the /proc/swaps table (sizes are reported in KiB)
pub fn parse_proc_swaps(content: &str) -> Vec<SwapDevice> {
    content
        .lines()
        .skip(1)
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(SwapDevice {
                name: fields[0].to_string(),
                kind: fields[1].to_string(),
                size_mb: fields[2].parse::<u64>().ok()? / 1024,
                used_mb: fields[3].parse::<u64>().ok()? / 1024,
                priority: fields[4].parse::<i64>().ok()?,
            })
        })
        .collect()
}

/// Total active swap in MB across all areas
pub fn total_swap_mb() -> Result<u64> {
    Ok(active_swaps()?.iter().map(|s| s.size_mb).sum())
}

/// Manages the tool's file-backed swap area
pub struct SwapFile {
    /// Backing file path
    pub path: PathBuf,
    /// fstab path, overridable for tests
    pub fstab: PathBuf,
}

impl SwapFile {
    /// Swap file at the conventional location
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            fstab: PathBuf::from("/etc/fstab"),
        }
    }

    /// Replace the swap area with one of `target_mb`
    ///
    /// Ordering: space precondition, swapoff the managed file, remove it,
    /// allocate the new file, mkswap, swapon, then register it for reboot
    /// persistence. Failure at any step surfaces as a swap-phase error;
    /// earlier steps are not undone.
    pub fn resize(&self, target_mb: u64) -> Result<()> {
        info!(path = %self.path.display(), target_mb, "resizing swap file");

        // The gate checks headroom earlier, but the filesystem may have
        // moved since; verify before removing the existing area.
        let required = target_mb * 1024 * 1024;
        let parent = self.path.parent().unwrap_or_else(|| Path::new("/"));
        if let Some(available) = crate::kernel::available_disk_space(parent) {
            if available < required {
                return Err(VmTuneError::InsufficientSpace {
                    path: self.path.clone(),
                    required,
                    available,
                });
            }
        }

        self.disable_if_active()?;

        if self.path.exists() {
            std::fs::remove_file(&self.path).with_path(&self.path)?;
        }

        self.allocate(target_mb * 1024 * 1024)?;
        self.format()?;
        self.enable()?;
        self.register_fstab()?;
        Ok(())
    }

    /// swapoff the managed file if it is currently an active swap area
    fn disable_if_active(&self) -> Result<()> {
        let active = active_swaps()?;
        let path_str = self.path.to_string_lossy();
        if !active.iter().any(|s| s.name == path_str) {
            return Ok(());
        }
        debug!(path = %self.path.display(), "disabling active swap file");
        run_checked("swapoff", &[path_str.as_ref()])
    }

    /// Allocate the backing file, preferring fallocate over zero-fill
    fn allocate(&self, bytes: u64) -> Result<()> {
        let file = std::fs::File::create(&self.path).with_path(&self.path)?;

        // Swap files must not be world-readable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms).with_path(&self.path)?;
        }

        #[cfg(target_os = "linux")]
        {
            use std::os::unix::io::AsRawFd;
            let rc = unsafe { libc::fallocate(file.as_raw_fd(), 0, 0, bytes as libc::off_t) };
            if rc == 0 {
                return Ok(());
            }
            warn!(
                path = %self.path.display(),
                "fallocate unsupported here, zero-filling swap file"
            );
        }

        self.zero_fill(file, bytes)
    }

    /// Write zeros in 4 MiB chunks; swapon rejects files with holes, so
    /// `set_len` is not an option
    fn zero_fill(&self, mut file: std::fs::File, bytes: u64) -> Result<()> {
        const CHUNK: usize = 4 * 1024 * 1024;
        let zeros = vec![0u8; CHUNK];
        let mut remaining = bytes;
        while remaining > 0 {
            let n = remaining.min(CHUNK as u64) as usize;
            file.write_all(&zeros[..n]).with_path(&self.path)?;
            remaining -= n as u64;
        }
        file.sync_all().with_path(&self.path)?;
        Ok(())
    }

    fn format(&self) -> Result<()> {
        let path = self.path.to_string_lossy();
        run_checked("mkswap", &[path.as_ref()])
            .map_err(|e| VmTuneError::swap(&self.path, e.to_string()))
    }

    fn enable(&self) -> Result<()> {
        let path = self.path.to_string_lossy();
        run_checked("swapon", &[path.as_ref()])
            .map_err(|e| VmTuneError::swap(&self.path, e.to_string()))
    }

    /// Add the fstab line once; re-runs must not duplicate it
    fn register_fstab(&self) -> Result<()> {
        let path_str = self.path.to_string_lossy();
        let existing = std::fs::read_to_string(&self.fstab).unwrap_or_default();
        let registered = existing.lines().any(|line| {
            let trimmed = line.trim();
            !trimmed.starts_with('#') && trimmed.split_whitespace().next() == Some(path_str.as_ref())
        });
        if registered {
            debug!(path = %self.path.display(), "swap file already registered in fstab");
            return Ok(());
        }

        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.fstab)
            .with_path(&self.fstab)?;
        let needs_newline = !existing.is_empty() && !existing.ends_with('\n');
        if needs_newline {
            writeln!(file).with_path(&self.fstab)?;
        }
        writeln!(file, "{} none swap sw 0 0", path_str).with_path(&self.fstab)?;
        info!(path = %self.path.display(), "registered swap file in fstab");
        Ok(())
    }
}

/// Run a command and turn a non-zero exit into an error
fn run_checked(program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| VmTuneError::CommandFailed {
            command: program.to_string(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(VmTuneError::CommandFailed {
            command: format!("{} {}", program, args.join(" ")),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE_SWAPS: &str = "\
Filename\t\t\t\tType\t\tSize\t\tUsed\t\tPriority
/swapfile                               file\t\t2097148\t\t1024\t\t-2
/dev/sda3                               partition\t1048572\t\t0\t\t-3
";

    #[test]
    fn test_parse_proc_swaps() {
        let swaps = parse_proc_swaps(SAMPLE_SWAPS);
        assert_eq!(swaps.len(), 2);
        assert_eq!(swaps[0].name, "/swapfile");
        assert_eq!(swaps[0].size_mb, 2047);
        assert_eq!(swaps[0].used_mb, 1);
        assert_eq!(swaps[1].kind, "partition");
        assert_eq!(swaps[1].priority, -3);
    }

    #[test]
    fn test_parse_proc_swaps_empty_table() {
        assert!(parse_proc_swaps("Filename Type Size Used Priority\n").is_empty());
    }

    #[test]
    fn test_register_fstab_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let fstab = dir.path().join("fstab");
        std::fs::write(&fstab, "/dev/sda1 / ext4 defaults 0 1\n").unwrap();

        let swap = SwapFile {
            path: PathBuf::from("/swapfile"),
            fstab: fstab.clone(),
        };
        swap.register_fstab().unwrap();
        swap.register_fstab().unwrap();

        let content = std::fs::read_to_string(&fstab).unwrap();
        let count = content
            .lines()
            .filter(|l| l.starts_with("/swapfile"))
            .count();
        assert_eq!(count, 1);
        assert!(content.contains("/swapfile none swap sw 0 0"));
    }

    #[test]
    fn test_register_fstab_ignores_comments() {
        let dir = TempDir::new().unwrap();
        let fstab = dir.path().join("fstab");
        std::fs::write(&fstab, "# /swapfile commented out\n").unwrap();

        let swap = SwapFile {
            path: PathBuf::from("/swapfile"),
            fstab: fstab.clone(),
        };
        swap.register_fstab().unwrap();
        let content = std::fs::read_to_string(&fstab).unwrap();
        assert!(content.lines().any(|l| l.starts_with("/swapfile")));
    }

    #[test]
    fn test_resize_refuses_without_disk_space() {
        let dir = TempDir::new().unwrap();
        let swap = SwapFile {
            path: dir.path().join("swapfile"),
            fstab: dir.path().join("fstab"),
        };

        // 4 PiB cannot fit anywhere this test runs.
        let err = swap.resize(1 << 32).unwrap_err();
        assert!(matches!(err, VmTuneError::InsufficientSpace { .. }));
        // Precondition fires before anything is touched.
        assert!(!swap.path.exists());
        assert!(!swap.fstab.exists());
    }

    #[test]
    fn test_zero_fill_produces_exact_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("swap");
        let swap = SwapFile::new(&path);
        let file = std::fs::File::create(&path).unwrap();
        swap.zero_fill(file, 5 * 1024 * 1024 + 123).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 5 * 1024 * 1024 + 123);
    }
}
