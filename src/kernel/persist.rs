//! Persisted sysctl configuration
//!
//! Writes the recommended tunables as a `key = value` drop-in, one commented
//! block per run. The previous file is backed up to a timestamped copy
//! first; when the filesystem cannot hold the backup the write proceeds
//! anyway with a warning, so live values are never blocked on persistence.

use crate::error::{IoResultExt, Result};
use crate::kernel::available_disk_space;
use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// Writer for the persisted sysctl drop-in
pub struct PersistedConfig {
    /// Drop-in path, conventionally /etc/sysctl.d/99-vmtune.conf
    pub path: PathBuf,
}

impl PersistedConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Rewrite the drop-in with one block of `key = value` lines
    ///
    /// Returns the backup path when one was taken.
    pub fn write_block(&self, entries: &[(&'static str, u64)]) -> Result<Option<PathBuf>> {
        let backup = self.backup_existing()?;
        self.write_entries(entries)?;
        Ok(backup)
    }

    /// Rewrite the drop-in without taking a backup
    ///
    /// For replacing a block this run already wrote (the overcommit update
    /// after the allocation probe, or its rollback); backing up our own
    /// intermediate file would clobber the pre-run backup taken seconds
    /// earlier.
    pub fn rewrite_block(&self, entries: &[(&'static str, u64)]) -> Result<()> {
        self.write_entries(entries)
    }

    fn write_entries(&self, entries: &[(&'static str, u64)]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }

        let mut content = String::new();
        content.push_str(&format!(
            "# Generated by vmtune on {}\n# Do not edit; re-run vmtune apply to refresh.\n",
            Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
        ));
        for (key, value) in entries {
            content.push_str(&format!("{} = {}\n", key, value));
        }

        let mut file = std::fs::File::create(&self.path).with_path(&self.path)?;
        file.write_all(content.as_bytes()).with_path(&self.path)?;
        file.sync_all().with_path(&self.path)?;
        info!(path = %self.path.display(), entries = entries.len(), "persisted sysctl block");
        Ok(())
    }

    /// Copy the existing file aside with a timestamp suffix
    ///
    /// Skipped gracefully when the filesystem lacks twice the file size; the
    /// caller still writes live values.
    fn backup_existing(&self) -> Result<Option<PathBuf>> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(_) => return Ok(None),
        };

        let required = metadata.len().max(4096) * 2;
        if let Some(available) = available_disk_space(&self.path) {
            if available < required {
                warn!(
                    path = %self.path.display(),
                    available,
                    required,
                    "skipping config backup, insufficient disk space"
                );
                return Ok(None);
            }
        }

        let backup = self.backup_path(&Utc::now().format("%Y%m%d-%H%M%S").to_string());
        std::fs::copy(&self.path, &backup).with_path(&backup)?;
        info!(backup = %backup.display(), "backed up previous config");
        Ok(Some(backup))
    }

    fn backup_path(&self, stamp: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".bak-{}", stamp));
        PathBuf::from(name)
    }
}

/// Parse a `key = value` drop-in back into pairs
pub fn parse_block(content: &str) -> Vec<(String, u64)> {
    content
        .lines()
        .filter_map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                return None;
            }
            let (key, value) = trimmed.split_once('=')?;
            Some((key.trim().to_string(), value.trim().parse::<u64>().ok()?))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_and_parse_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("99-vmtune.conf");
        let config = PersistedConfig::new(&path);

        let backup = config
            .write_block(&[("vm.swappiness", 10), ("vm.dirty_ratio", 20)])
            .unwrap();
        assert!(backup.is_none());

        let parsed = parse_block(&std::fs::read_to_string(&path).unwrap());
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], ("vm.swappiness".to_string(), 10));
        assert_eq!(parsed[1], ("vm.dirty_ratio".to_string(), 20));
    }

    #[test]
    fn test_rewrite_backs_up_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("99-vmtune.conf");
        let config = PersistedConfig::new(&path);

        config.write_block(&[("vm.swappiness", 60)]).unwrap();
        let backup = config.write_block(&[("vm.swappiness", 10)]).unwrap();

        let backup = backup.expect("second write must back up the first");
        assert!(backup.to_string_lossy().contains(".bak-"));
        let old = std::fs::read_to_string(&backup).unwrap();
        assert!(old.contains("vm.swappiness = 60"));
        let new = std::fs::read_to_string(&path).unwrap();
        assert!(new.contains("vm.swappiness = 10"));
    }

    #[test]
    fn test_parse_block_skips_comments_and_garbage() {
        let parsed = parse_block("# header\nvm.swappiness = 10\nnot a pair\nvm.x = abc\n");
        assert_eq!(parsed, vec![("vm.swappiness".to_string(), 10)]);
    }
}
