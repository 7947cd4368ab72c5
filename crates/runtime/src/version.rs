// SPDX-License-Identifier: MIT

//! Resolves `"latest"` to the highest semver-comparable version directory
//! (spec.md §4.6 "Versioning"). No `semver` crate: runtime directory names
//! are controlled by the registry fetch process (out of core scope here),
//! so a plain dot-separated numeric comparison covers every real case.

use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
struct VersionKey(Vec<u64>, String);

impl VersionKey {
    fn parse(raw: &str) -> Self {
        let parts = raw.split('.').map(|p| p.parse::<u64>().unwrap_or(0)).collect();
        VersionKey(parts, raw.to_string())
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0).then_with(|| self.1.cmp(&other.1))
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Picks the highest version string out of `candidates`. Empty input has no
/// highest version.
pub fn highest<'a>(candidates: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    candidates.into_iter().max_by_key(|v| VersionKey::parse(v))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_highest_dotted_numeric_version() {
        assert_eq!(highest(["3.9.0", "3.12.4", "3.10.1"]), Some("3.12.4"));
    }

    #[test]
    fn single_candidate_is_its_own_highest() {
        assert_eq!(highest(["1.0.0"]), Some("1.0.0"));
    }

    #[test]
    fn no_candidates_has_no_highest() {
        assert_eq!(highest(Vec::new()), None);
    }
}
