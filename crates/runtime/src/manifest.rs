// SPDX-License-Identifier: MIT

//! `runtime.yml` schema (spec.md §4.6, §3 "Runtime instance"): mount
//! entries relative to the runtime directory, environment additions, and
//! the resource minimums a job using this runtime must request at least.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMount {
    /// Relative to the runtime directory (e.g. `isolated/usr/bin/python3`).
    pub source: PathBuf,
    /// Absolute path inside the job root.
    pub target: PathBuf,
    #[serde(default)]
    pub readonly: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceMinimums {
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub cpu_percent: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub mounts: Vec<ManifestMount>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub minimums: ResourceMinimums,
}

impl RuntimeManifest {
    pub fn parse(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_manifest() {
        let yaml = "name: python\nversion: 3.12.4\nmounts:\n  - source: isolated/usr/bin/python3\n    target: /usr/bin/python3\n    readonly: true\n";
        let manifest = RuntimeManifest::parse(yaml).unwrap();
        assert_eq!(manifest.name, "python");
        assert_eq!(manifest.mounts.len(), 1);
        assert!(manifest.mounts[0].readonly);
    }

    #[test]
    fn missing_optional_sections_default_empty() {
        let yaml = "name: node\nversion: 20.11.0\n";
        let manifest = RuntimeManifest::parse(yaml).unwrap();
        assert!(manifest.mounts.is_empty());
        assert!(manifest.env.is_empty());
        assert_eq!(manifest.minimums.memory_mb, None);
    }
}
