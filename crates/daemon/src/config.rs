// SPDX-License-Identifier: MIT

//! Daemon configuration (spec.md §6 "Config file"): cgroup/runtime/log
//! roots, the client-facing socket, and the state-persistence WAL path.
//! Parsed from `jobletd.toml`; every field has a production-sane default so
//! the daemon starts with zero config in a dev environment.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub cgroup_root: PathBuf,
    pub runtime_root: PathBuf,
    pub log_root: PathBuf,
    pub jobs_root: PathBuf,
    pub wal_path: PathBuf,
    pub volumes_root: PathBuf,
    /// Per-(job,stream) ring buffer capacity (spec.md §4.5).
    pub log_ring_capacity_bytes: usize,
    /// How often RR/CC sampling ticks fire for a live subscriber (spec.md §4.3).
    pub metrics_sample_interval_ms: u64,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    socket_path: Option<PathBuf>,
    cgroup_root: Option<PathBuf>,
    runtime_root: Option<PathBuf>,
    log_root: Option<PathBuf>,
    jobs_root: Option<PathBuf>,
    wal_path: Option<PathBuf>,
    volumes_root: Option<PathBuf>,
    log_ring_capacity_bytes: Option<usize>,
    metrics_sample_interval_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/run/joblet/jobletd.sock"),
            cgroup_root: PathBuf::from(joblet_cgroup::DEFAULT_CGROUP_ROOT),
            runtime_root: PathBuf::from("/opt/joblet/runtimes"),
            log_root: PathBuf::from("/opt/joblet/logs"),
            jobs_root: PathBuf::from("/opt/joblet/jobs"),
            wal_path: PathBuf::from("/opt/joblet/state/jobs.wal"),
            volumes_root: PathBuf::from("/opt/joblet/volumes"),
            log_ring_capacity_bytes: 4 * 1024 * 1024,
            metrics_sample_interval_ms: 5_000,
        }
    }
}

impl Config {
    pub const DEFAULT_PATH: &'static str = "/etc/joblet/jobletd.toml";

    /// Loads from `path` if it exists, overlaying onto defaults. A missing
    /// file is not an error — only a genuinely malformed one is.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        if !path.exists() {
            return Ok(defaults);
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        let parsed: RawConfig =
            toml::from_str(&raw).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })?;
        Ok(Self {
            socket_path: parsed.socket_path.unwrap_or(defaults.socket_path),
            cgroup_root: parsed.cgroup_root.unwrap_or(defaults.cgroup_root),
            runtime_root: parsed.runtime_root.unwrap_or(defaults.runtime_root),
            log_root: parsed.log_root.unwrap_or(defaults.log_root),
            jobs_root: parsed.jobs_root.unwrap_or(defaults.jobs_root),
            wal_path: parsed.wal_path.unwrap_or(defaults.wal_path),
            volumes_root: parsed.volumes_root.unwrap_or(defaults.volumes_root),
            log_ring_capacity_bytes: parsed.log_ring_capacity_bytes.unwrap_or(defaults.log_ring_capacity_bytes),
            metrics_sample_interval_ms: parsed
                .metrics_sample_interval_ms
                .unwrap_or(defaults.metrics_sample_interval_ms),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config.socket_path, Config::default().socket_path);
    }

    #[test]
    fn partial_overrides_fall_back_to_defaults_for_the_rest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobletd.toml");
        std::fs::write(&path, "socket_path = \"/tmp/custom.sock\"\n").unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.socket_path, PathBuf::from("/tmp/custom.sock"));
        assert_eq!(config.cgroup_root, Config::default().cgroup_root);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobletd.toml");
        std::fs::write(&path, "not valid toml = [").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse { .. })));
    }
}
