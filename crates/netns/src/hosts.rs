// SPDX-License-Identifier: MIT

//! Optional `/etc/hosts` convenience entries for sibling jobs on the same
//! custom network (spec.md §4.4 step 5). Entries are tagged with a marker
//! comment so teardown can remove exactly what it added without disturbing
//! anything else in the file.

use crate::error::NetError;
use std::net::Ipv4Addr;
use std::path::Path;

fn marker(job_id: joblet_core::JobId) -> String {
    format!("# joblet:{job_id}")
}

/// Appends one `<ip> <hostname> # joblet:<job_id>` line per sibling. `path`
/// is the job's own `/etc/hosts`, reached via its mount namespace (e.g.
/// `/proc/<pid>/root/etc/hosts`).
pub fn add_entries(
    path: &Path,
    job_id: joblet_core::JobId,
    entries: &[(String, Ipv4Addr)],
) -> Result<(), NetError> {
    if entries.is_empty() {
        return Ok(());
    }
    let tag = marker(job_id);
    let mut block = String::new();
    for (hostname, ip) in entries {
        block.push_str(&format!("{ip} {hostname} {tag}\n"));
    }
    let mut existing =
        std::fs::read_to_string(path).map_err(|source| NetError::Read { path: path.to_path_buf(), source })?;
    existing.push_str(&block);
    std::fs::write(path, existing).map_err(|source| NetError::Read { path: path.to_path_buf(), source })
}

/// Removes every line tagged for `job_id` (spec.md §4.4 Teardown: "removes
/// any temporary `/etc/hosts` augmentations").
pub fn remove_entries(path: &Path, job_id: joblet_core::JobId) -> Result<(), NetError> {
    let tag = marker(job_id);
    let Ok(content) = std::fs::read_to_string(path) else { return Ok(()) };
    let filtered: String = content
        .lines()
        .filter(|line| !line.ends_with(&tag))
        .map(|line| format!("{line}\n"))
        .collect();
    std::fs::write(path, filtered).map_err(|source| NetError::Read { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::JobId;
    use tempfile::NamedTempFile;

    #[test]
    fn add_then_remove_round_trips() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "127.0.0.1 localhost\n").unwrap();
        let job_id = JobId::new();
        add_entries(file.path(), job_id, &[("peer-a".into(), "172.20.0.5".parse().unwrap())]).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("172.20.0.5 peer-a"));

        remove_entries(file.path(), job_id).unwrap();
        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content, "127.0.0.1 localhost\n");
    }

    #[test]
    fn empty_entries_is_a_noop() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "127.0.0.1 localhost\n").unwrap();
        add_entries(file.path(), JobId::new(), &[]).unwrap();
        assert_eq!(std::fs::read_to_string(file.path()).unwrap(), "127.0.0.1 localhost\n");
    }
}
