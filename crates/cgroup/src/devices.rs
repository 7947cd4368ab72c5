// SPDX-License-Identifier: MIT

//! Block device enumeration for `io.max` (spec.md §4.3: "for each block
//! device discovered under `/sys/block`").

use crate::error::CgroupError;
use std::fs;
use std::path::Path;

/// Returns `(major, minor)` for every entry under `/sys/block` that exposes
/// a `dev` file (`"<major>:<minor>\n"`).
pub fn discover_block_devices(sys_block: &Path) -> Result<Vec<(u32, u32)>, CgroupError> {
    let mut devices = Vec::new();
    let entries = match fs::read_dir(sys_block) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(devices),
        Err(e) => return Err(CgroupError::EnumerateBlockDevices(e)),
    };
    for entry in entries {
        let entry = entry.map_err(CgroupError::EnumerateBlockDevices)?;
        let dev_file = entry.path().join("dev");
        let Ok(content) = fs::read_to_string(&dev_file) else { continue };
        if let Some((major, minor)) = parse_major_minor(content.trim()) {
            devices.push((major, minor));
        }
    }
    devices.sort_unstable();
    Ok(devices)
}

fn parse_major_minor(s: &str) -> Option<(u32, u32)> {
    let (major, minor) = s.split_once(':')?;
    Some((major.parse().ok()?, minor.parse().ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn discovers_devices_with_a_dev_file() {
        let root = tempdir().unwrap();
        let sda = root.path().join("sda");
        fs::create_dir(&sda).unwrap();
        fs::write(sda.join("dev"), "8:0\n").unwrap();
        let nvme = root.path().join("nvme0n1");
        fs::create_dir(&nvme).unwrap();
        fs::write(nvme.join("dev"), "259:0\n").unwrap();

        let mut devices = discover_block_devices(root.path()).unwrap();
        devices.sort_unstable();
        assert_eq!(devices, vec![(8, 0), (259, 0)]);
    }

    #[test]
    fn missing_sys_block_yields_empty_list() {
        let root = tempdir().unwrap();
        let missing = root.path().join("does-not-exist");
        assert_eq!(discover_block_devices(&missing).unwrap(), Vec::new());
    }
}
