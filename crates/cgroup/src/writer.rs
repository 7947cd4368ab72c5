// SPDX-License-Identifier: MIT

//! Control-file writers (spec.md §4.3 quota table). Each function formats
//! the request as the exact control-file syntax the kernel expects and
//! writes it; callers decide whether a zero request means "skip" or "max".

use crate::error::CgroupError;
use crate::paths::control_file;
use joblet_core::ResourceRequest;
use std::fs;
use std::path::Path;

const DEFAULT_CPU_PERIOD_US: u64 = 100_000;

fn write_control(job_dir: &Path, name: &str, value: &str) -> Result<(), CgroupError> {
    let path = control_file(job_dir, name);
    fs::write(&path, value)
        .map_err(|source| CgroupError::Write { path, value: value.to_string(), source })
}

/// `cpu.max`: `"<quota_us> <period_us>"`, or `"max <period_us>"` when
/// `cpu_percent == 0` (spec.md §4.3: "0 means max").
pub fn write_cpu_max(job_dir: &Path, cpu_percent: u32) -> Result<(), CgroupError> {
    let value = if cpu_percent == 0 {
        format!("max {DEFAULT_CPU_PERIOD_US}")
    } else {
        let quota_us = (cpu_percent as u64) * DEFAULT_CPU_PERIOD_US / 100;
        format!("{quota_us} {DEFAULT_CPU_PERIOD_US}")
    };
    write_control(job_dir, "cpu.max", &value)
}

/// `cpuset.cpus`: the literal list/range. Skipped entirely when empty
/// (unconstrained, spec.md §3).
pub fn write_cpuset(job_dir: &Path, cpu_cores: &str) -> Result<(), CgroupError> {
    if cpu_cores.is_empty() {
        return Ok(());
    }
    write_control(job_dir, "cpuset.cpus", cpu_cores)
}

/// `memory.max`: `memory_mb * 1MiB` in bytes, or `"max"` when `memory_mb == 0`.
pub fn write_memory_max(job_dir: &Path, memory_mb: u64) -> Result<(), CgroupError> {
    let value =
        if memory_mb == 0 { "max".to_string() } else { (memory_mb * 1_048_576).to_string() };
    write_control(job_dir, "memory.max", &value)
}

/// `pids.max`: the effective value (default 1024, spec.md §4.3 table).
pub fn write_pids_max(job_dir: &Path, pids_max_effective: u32) -> Result<(), CgroupError> {
    write_control(job_dir, "pids.max", &pids_max_effective.to_string())
}

/// `io.max`: one line per discovered block device, `"<major>:<minor>
/// rbps=N wbps=N"`. Skipped entirely when `io_bps == 0` (unconstrained).
pub fn write_io_max(job_dir: &Path, io_bps: u64, block_devices: &[(u32, u32)]) -> Result<(), CgroupError> {
    if io_bps == 0 {
        return Ok(());
    }
    for &(major, minor) in block_devices {
        let value = format!("{major}:{minor} rbps={io_bps} wbps={io_bps}");
        write_control(job_dir, "io.max", &value)?;
    }
    Ok(())
}

/// Apply the full resource request to an already-created job cgroup
/// directory, in the order spec.md §4.3 lists its table.
pub fn apply_resources(
    job_dir: &Path,
    resources: &ResourceRequest,
    block_devices: &[(u32, u32)],
) -> Result<(), CgroupError> {
    write_cpu_max(job_dir, resources.cpu_percent)?;
    write_cpuset(job_dir, &resources.cpu_cores)?;
    write_memory_max(job_dir, resources.memory_mb)?;
    write_io_max(job_dir, resources.io_bps, block_devices)?;
    write_pids_max(job_dir, resources.pids_max_effective())?;
    Ok(())
}

/// Write the job's PID to `cgroup.procs` (spec.md §4.3 "Process attachment").
pub fn attach_pid(job_dir: &Path, pid: u32) -> Result<(), CgroupError> {
    write_control(job_dir, "cgroup.procs", &pid.to_string())
}

/// Enable controllers in `cgroup.subtree_control` of the slice directory
/// (spec.md §4.3: `cpu memory io pids cpuset`).
pub fn enable_controllers(slice_dir: &Path) -> Result<(), CgroupError> {
    write_control(slice_dir, "cgroup.subtree_control", "+cpu +memory +io +pids +cpuset")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn cpu_max_zero_writes_max_quota() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cpu.max"), "").unwrap();
        write_cpu_max(dir.path(), 0).unwrap();
        let content = fs::read_to_string(dir.path().join("cpu.max")).unwrap();
        assert_eq!(content, "max 100000");
    }

    #[test]
    fn cpu_max_nonzero_computes_quota_over_period() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("cpu.max"), "").unwrap();
        write_cpu_max(dir.path(), 50).unwrap();
        let content = fs::read_to_string(dir.path().join("cpu.max")).unwrap();
        assert_eq!(content, "50000 100000");
    }

    #[test]
    fn memory_max_zero_is_unlimited() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("memory.max"), "").unwrap();
        write_memory_max(dir.path(), 0).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("memory.max")).unwrap(), "max");
    }

    #[test]
    fn memory_max_converts_mb_to_bytes() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("memory.max"), "").unwrap();
        write_memory_max(dir.path(), 256).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("memory.max")).unwrap(),
            (256u64 * 1_048_576).to_string()
        );
    }

    #[test]
    fn io_max_skipped_when_unbounded() {
        let dir = tempdir().unwrap();
        write_io_max(dir.path(), 0, &[(8, 0)]).unwrap();
        assert!(!dir.path().join("io.max").exists());
    }

    #[test]
    fn cpuset_skipped_when_empty() {
        let dir = tempdir().unwrap();
        write_cpuset(dir.path(), "").unwrap();
        assert!(!dir.path().join("cpuset.cpus").exists());
    }
}
