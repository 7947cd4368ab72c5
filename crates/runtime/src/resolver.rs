// SPDX-License-Identifier: MIT

//! The Runtime Resolver (RR, spec.md §4.6): locates a runtime's directory,
//! parses and validates its manifest, and exposes the pieces
//! `joblet-isolation::MountPlanBuilder::production` needs.

use crate::error::RuntimeError;
use crate::manifest::RuntimeManifest;
use crate::version;
use joblet_core::RuntimeRef;
use std::path::{Path, PathBuf};
use tracing::instrument;

pub const RUNTIME_YML: &str = "runtime.yml";
pub const ISOLATED_SUBTREE: &str = "isolated";

pub struct RuntimeResolver {
    root: PathBuf,
}

pub struct ResolvedRuntime {
    pub dir: PathBuf,
    pub isolated_root: PathBuf,
    pub manifest: RuntimeManifest,
    /// `(target, path-relative-to-isolated_root)` pairs, ready for
    /// `MountPlanBuilder::production`'s `runtime_targets` argument.
    pub mount_targets: Vec<(PathBuf, PathBuf)>,
}

impl RuntimeResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn with_default_root() -> Self {
        Self::new("/opt/joblet/runtimes")
    }

    /// Resolves "latest" against the installed version directories and
    /// returns `name-version` (spec.md §4.6 "Versioning").
    fn resolve_version(&self, runtime_ref: &RuntimeRef) -> Result<String, RuntimeError> {
        if runtime_ref.version != "latest" {
            return Ok(runtime_ref.version.clone());
        }
        let prefix = format!("{}-", runtime_ref.name);
        let entries = std::fs::read_dir(&self.root).map_err(|source| RuntimeError::Read {
            path: self.root.clone(),
            source,
        })?;
        let versions: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|name| name.strip_prefix(&prefix).map(str::to_string))
            .collect();
        let highest = version::highest(versions.iter().map(String::as_str))
            .ok_or_else(|| RuntimeError::NoVersions { name: runtime_ref.name.clone(), root: self.root.clone() })?
            .to_string();
        Ok(highest)
    }

    #[instrument(skip(self), fields(runtime = %runtime_ref.name))]
    pub fn resolve(&self, runtime_ref: &RuntimeRef) -> Result<ResolvedRuntime, RuntimeError> {
        let resolved_version = self.resolve_version(runtime_ref)?;
        let dir_name = runtime_ref.dir_name(&resolved_version);
        let dir = self.root.join(&dir_name);
        if !dir.is_dir() {
            return Err(RuntimeError::NotFound {
                name: runtime_ref.name.clone(),
                version: resolved_version,
                root: self.root.clone(),
            });
        }

        let manifest_path = dir.join(RUNTIME_YML);
        let raw = std::fs::read_to_string(&manifest_path)
            .map_err(|source| RuntimeError::Read { path: manifest_path.clone(), source })?;
        let manifest = RuntimeManifest::parse(&raw).map_err(|source| RuntimeError::Parse { path: manifest_path, source })?;

        let isolated_root = dir.join(ISOLATED_SUBTREE);
        let mut mount_targets = Vec::with_capacity(manifest.mounts.len());
        for mount in &manifest.mounts {
            let rel = validate_mount_source(&dir, &isolated_root, &mount.source, &manifest.name, &resolved_version)?;
            mount_targets.push((mount.target.clone(), rel));
        }

        Ok(ResolvedRuntime { dir, isolated_root, manifest, mount_targets })
    }
}

/// The security-critical invariant (spec.md §4.6): every mount source must
/// resolve, after symlink expansion, to a path under `<runtime-dir>/isolated/`.
/// Returns the source's path relative to `isolated_root` on success.
fn validate_mount_source(
    runtime_dir: &Path,
    isolated_root: &Path,
    source: &Path,
    name: &str,
    version: &str,
) -> Result<PathBuf, RuntimeError> {
    let absolute = runtime_dir.join(source);
    let canonical = absolute.canonicalize().unwrap_or(absolute.clone());
    let canonical_isolated = isolated_root.canonicalize().unwrap_or_else(|_| isolated_root.to_path_buf());

    if !canonical.starts_with(&canonical_isolated) {
        return Err(RuntimeError::MountEscapesIsolated {
            name: name.to_string(),
            version: version.to_string(),
            source_path: absolute,
        });
    }

    canonical
        .strip_prefix(&canonical_isolated)
        .map(Path::to_path_buf)
        .map_err(|_| RuntimeError::MountEscapesIsolated { name: name.to_string(), version: version.to_string(), source_path: absolute })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_runtime(root: &Path, dir_name: &str, manifest_yaml: &str, mount_files: &[&str]) {
        let dir = root.join(dir_name);
        let isolated = dir.join(ISOLATED_SUBTREE);
        std::fs::create_dir_all(&isolated).unwrap();
        std::fs::write(dir.join(RUNTIME_YML), manifest_yaml).unwrap();
        for rel in mount_files {
            let path = dir.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, b"").unwrap();
        }
    }

    #[test]
    fn resolves_latest_to_highest_installed_version() {
        let root = tempdir().unwrap();
        write_runtime(root.path(), "python-3.9.0", "name: python\nversion: 3.9.0\n", &[]);
        write_runtime(root.path(), "python-3.12.4", "name: python\nversion: 3.12.4\n", &[]);

        let resolver = RuntimeResolver::new(root.path());
        let resolved = resolver.resolve(&RuntimeRef::new("python")).unwrap();
        assert_eq!(resolved.dir, root.path().join("python-3.12.4"));
    }

    #[test]
    fn mount_source_inside_isolated_is_accepted_and_made_relative() {
        let root = tempdir().unwrap();
        write_runtime(
            root.path(),
            "python-3.12.4",
            "name: python\nversion: 3.12.4\nmounts:\n  - source: isolated/usr/bin/python3\n    target: /usr/bin/python3\n    readonly: true\n",
            &["isolated/usr/bin/python3"],
        );

        let resolver = RuntimeResolver::new(root.path());
        let resolved = resolver.resolve(&RuntimeRef { name: "python".into(), version: "3.12.4".into() }).unwrap();
        assert_eq!(resolved.mount_targets, vec![(PathBuf::from("/usr/bin/python3"), PathBuf::from("usr/bin/python3"))]);
    }

    #[test]
    fn mount_source_outside_isolated_is_rejected() {
        let root = tempdir().unwrap();
        write_runtime(
            root.path(),
            "java-17.0.0",
            "name: java\nversion: 17.0.0\nmounts:\n  - source: usr/bin/java\n    target: /usr/bin/java\n    readonly: true\n",
            &["usr/bin/java"],
        );

        let resolver = RuntimeResolver::new(root.path());
        let err = resolver.resolve(&RuntimeRef { name: "java".into(), version: "17.0.0".into() }).unwrap_err();
        assert!(matches!(err, RuntimeError::MountEscapesIsolated { .. }));
    }

    #[test]
    fn missing_runtime_directory_is_not_found() {
        let root = tempdir().unwrap();
        let resolver = RuntimeResolver::new(root.path());
        let err = resolver.resolve(&RuntimeRef { name: "ruby".into(), version: "3.3.0".into() }).unwrap_err();
        assert!(matches!(err, RuntimeError::NotFound { .. }));
    }
}
