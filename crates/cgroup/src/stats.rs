// SPDX-License-Identifier: MIT

//! Cgroup v2 statistics reading (spec.md §4.3 `sample(uuid)`): cpu usage
//! and throttling from `cpu.stat`, memory from `memory.current`/`memory.peak`
//! /`memory.stat`/`memory.events`, io from `io.stat`, pids from
//! `pids.current`/`pids.max`, and PSI pressure from `*.pressure`.

use crate::error::CgroupError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Instant;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CpuStat {
    pub usage_percent: f64,
    pub throttled_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStat {
    pub current: u64,
    pub peak: u64,
    pub anon: u64,
    pub file: u64,
    pub oom_events: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoStat {
    pub rbytes: u64,
    pub wbytes: u64,
    pub rios: u64,
    pub wios: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PidsStat {
    pub current: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PressureStat {
    pub avg10: f64,
    pub avg60: f64,
    pub avg300: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sample {
    pub cpu: CpuStat,
    pub memory: MemoryStat,
    pub io: IoStat,
    pub pids: PidsStat,
    pub cpu_pressure: PressureStat,
    pub memory_pressure: PressureStat,
    pub io_pressure: PressureStat,
}

fn read_file(path: &Path) -> Result<String, CgroupError> {
    fs::read_to_string(path).map_err(|source| CgroupError::Read { path: path.to_path_buf(), source })
}

/// Parse a `key=value` token out of an `io.stat`-style line
/// (`"8:0 rbytes=123 wbytes=456 rios=7 wios=8"`).
fn parse_u64_field(line: &str, key: &str) -> Option<u64> {
    line.split_whitespace().find_map(|tok| tok.strip_prefix(&format!("{key}=")).and_then(|v| v.parse().ok()))
}

fn read_keyed_u64(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let mut it = line.split_whitespace();
        if it.next()? == key {
            it.next()?.parse().ok()
        } else {
            None
        }
    })
}

fn parse_pressure(content: &str) -> PressureStat {
    let some_line = content.lines().find(|l| l.starts_with("some")).unwrap_or("");
    PressureStat {
        avg10: parse_f64_field(some_line, "avg10"),
        avg60: parse_f64_field(some_line, "avg60"),
        avg300: parse_f64_field(some_line, "avg300"),
    }
}

fn parse_f64_field(line: &str, key: &str) -> f64 {
    line.split_whitespace()
        .find_map(|tok| tok.strip_prefix(&format!("{key}=")).and_then(|v| v.parse::<f64>().ok()))
        .unwrap_or(0.0)
}

/// Reads the instantaneous (non-rate) parts of a sample: memory, io, pids,
/// pressure. CPU usage/throttle percentages require a previous reading and
/// are computed by [`Sampler`].
pub fn read_instantaneous(job_dir: &Path) -> Result<(MemoryStat, IoStat, PidsStat, PressureStat, PressureStat, PressureStat), CgroupError> {
    let memory_current = read_file(&job_dir.join("memory.current"))?.trim().parse().unwrap_or(0);
    let memory_peak = fs::read_to_string(job_dir.join("memory.peak")).ok().and_then(|s| s.trim().parse().ok()).unwrap_or(memory_current);
    let memory_stat_content = read_file(&job_dir.join("memory.stat"))?;
    let anon = read_keyed_u64(&memory_stat_content, "anon").unwrap_or(0);
    let file = read_keyed_u64(&memory_stat_content, "file").unwrap_or(0);
    let events_content = read_file(&job_dir.join("memory.events"))?;
    let oom_events = read_keyed_u64(&events_content, "oom_kill").unwrap_or(0);
    let memory = MemoryStat { current: memory_current, peak: memory_peak, anon, file, oom_events };

    let io_content = fs::read_to_string(job_dir.join("io.stat")).unwrap_or_default();
    let mut io = IoStat::default();
    for line in io_content.lines() {
        io.rbytes += parse_u64_field(line, "rbytes").unwrap_or(0);
        io.wbytes += parse_u64_field(line, "wbytes").unwrap_or(0);
        io.rios += parse_u64_field(line, "rios").unwrap_or(0);
        io.wios += parse_u64_field(line, "wios").unwrap_or(0);
    }

    let pids_current = read_file(&job_dir.join("pids.current"))?.trim().parse().unwrap_or(0);
    let pids_max_content = fs::read_to_string(job_dir.join("pids.max")).unwrap_or_default();
    let pids_max = pids_max_content.trim().parse().unwrap_or(u64::MAX);
    let pids = PidsStat { current: pids_current, max: pids_max };

    let cpu_pressure = fs::read_to_string(job_dir.join("cpu.pressure")).map(|c| parse_pressure(&c)).unwrap_or_default();
    let memory_pressure = fs::read_to_string(job_dir.join("memory.pressure")).map(|c| parse_pressure(&c)).unwrap_or_default();
    let io_pressure = fs::read_to_string(job_dir.join("io.pressure")).map(|c| parse_pressure(&c)).unwrap_or_default();

    Ok((memory, io, pids, cpu_pressure, memory_pressure, io_pressure))
}

fn read_cpu_stat(job_dir: &Path) -> Result<(u64, u64), CgroupError> {
    let content = read_file(&job_dir.join("cpu.stat"))?;
    let usage_usec = read_keyed_u64(&content, "usage_usec").unwrap_or(0);
    let throttled_usec = read_keyed_u64(&content, "throttled_usec").unwrap_or(0);
    Ok((usage_usec, throttled_usec))
}

/// Tracks per-job previous `cpu.stat` readings so `usage_percent`/
/// `throttled_percent` can be computed as a delta over wall-clock time
/// (spec.md §4.3: "computed from cpu.stat usage_usec delta over wall-clock
/// delta").
#[derive(Debug, Default)]
pub struct Sampler {
    previous: HashMap<joblet_core::JobId, (u64, u64, Instant)>,
}

impl Sampler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(&mut self, job_id: joblet_core::JobId, job_dir: &Path) -> Result<Sample, CgroupError> {
        let (usage_usec, throttled_usec) = read_cpu_stat(job_dir)?;
        let now = Instant::now();

        let cpu = match self.previous.insert(job_id, (usage_usec, throttled_usec, now)) {
            Some((prev_usage, prev_throttled, prev_time)) => {
                let wall_usec = now.duration_since(prev_time).as_micros().max(1) as u64;
                let usage_delta = usage_usec.saturating_sub(prev_usage);
                let throttled_delta = throttled_usec.saturating_sub(prev_throttled);
                CpuStat {
                    usage_percent: (usage_delta as f64 / wall_usec as f64) * 100.0,
                    throttled_percent: (throttled_delta as f64 / wall_usec as f64) * 100.0,
                }
            }
            None => CpuStat::default(),
        };

        let (memory, io, pids, cpu_pressure, memory_pressure, io_pressure) = read_instantaneous(job_dir)?;
        Ok(Sample { cpu, memory, io, pids, cpu_pressure, memory_pressure, io_pressure })
    }

    /// Drop cached state for a job that has gone terminal (spec.md §4.3
    /// sampling is rate-decoupled per job; stale entries would otherwise
    /// accumulate for the life of the daemon).
    pub fn forget(&mut self, job_id: joblet_core::JobId) {
        self.previous.remove(&job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_core::JobId;
    use std::fs;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    fn setup_fixture(dir: &Path, usage_usec: u64) {
        write(dir, "cpu.stat", &format!("usage_usec {usage_usec}\nuser_usec 0\nsystem_usec 0\nnr_periods 0\nnr_throttled 0\nthrottled_usec 0\n"));
        write(dir, "memory.current", "1048576\n");
        write(dir, "memory.stat", "anon 500000\nfile 500000\n");
        write(dir, "memory.events", "low 0\nhigh 0\nmax 0\noom 0\noom_kill 0\n");
        write(dir, "pids.current", "3\n");
        write(dir, "pids.max", "1024\n");
    }

    #[test]
    fn first_sample_has_zero_cpu_usage() {
        let dir = tempdir().unwrap();
        setup_fixture(dir.path(), 1000);
        let mut sampler = Sampler::new();
        let sample = sampler.sample(JobId::new(), dir.path()).unwrap();
        assert_eq!(sample.cpu, CpuStat::default());
        assert_eq!(sample.memory.current, 1_048_576);
        assert_eq!(sample.pids.current, 3);
    }

    #[test]
    fn second_sample_computes_a_nonzero_delta() {
        let dir = tempdir().unwrap();
        let job_id = JobId::new();
        let mut sampler = Sampler::new();
        setup_fixture(dir.path(), 1000);
        sampler.sample(job_id, dir.path()).unwrap();
        setup_fixture(dir.path(), 51_000);
        let sample = sampler.sample(job_id, dir.path()).unwrap();
        assert!(sample.cpu.usage_percent > 0.0);
    }

    #[test]
    fn forget_removes_cached_state() {
        let dir = tempdir().unwrap();
        let job_id = JobId::new();
        setup_fixture(dir.path(), 1000);
        let mut sampler = Sampler::new();
        sampler.sample(job_id, dir.path()).unwrap();
        sampler.forget(job_id);
        assert!(!sampler.previous.contains_key(&job_id));
    }
}
