// SPDX-License-Identifier: MIT

//! A job's reference to a runtime (name + optional version). Resolution
//! into a concrete mount plan is `joblet-runtime`'s job (RR, spec.md §4.6);
//! this is just the value type a `JobSpec` carries.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeRef {
    pub name: String,
    /// Defaults to `"latest"` (spec.md §4.6).
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "latest".to_string()
}

impl RuntimeRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), version: default_version() }
    }

    /// Directory name under `/opt/joblet/runtimes/` once `version` is
    /// resolved from "latest" to a concrete semver (spec.md §6).
    pub fn dir_name(&self, resolved_version: &str) -> String {
        format!("{}-{}", self.name, resolved_version)
    }
}
