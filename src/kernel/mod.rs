//! OS interface: sysctl access, persisted configuration, swap lifecycle

pub mod persist;
pub mod swap;
pub mod sysctl;

pub use persist::PersistedConfig;
pub use swap::{SwapDevice, SwapFile};
pub use sysctl::{read_sysctl_u64, write_sysctl, Tunable, VmState};

use std::path::Path;

/// Available space in bytes on the filesystem holding `path`
///
/// Longest-mount-point-prefix match over the detected disks; None when the
/// path maps to no known mount.
pub fn available_disk_space(path: &Path) -> Option<u64> {
    use sysinfo::Disks;

    let disks = Disks::new_with_refreshed_list();
    let path_str = path.to_string_lossy();

    let mut best: Option<(&sysinfo::Disk, usize)> = None;
    for disk in disks.iter() {
        let mount = disk.mount_point().to_string_lossy();
        if path_str.starts_with(mount.as_ref()) {
            match best {
                Some((_, len)) if len >= mount.len() => {}
                _ => best = Some((disk, mount.len())),
            }
        }
    }

    best.map(|(disk, _)| disk.available_space())
}
