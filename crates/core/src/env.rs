// SPDX-License-Identifier: MIT

//! Secret environment variable detection (naming-convention based).
//!
//! spec.md §3 Data Model: "any name starting with `SECRET_` or ending in
//! `_TOKEN|_KEY|_PASSWORD|_SECRET` is a secret and is masked in status
//! views". The source system also carried a deprecated `secret_environment`
//! field alongside this; DESIGN.md records the decision to keep only the
//! naming-convention path (spec.md §9 Open Questions).

pub const MASK: &str = "***";

const SUFFIXES: &[&str] = &["_TOKEN", "_KEY", "_PASSWORD", "_SECRET"];

/// True if `name` should be treated as a secret environment variable.
pub fn is_secret_env_name(name: &str) -> bool {
    name.starts_with("SECRET_") || SUFFIXES.iter().any(|suf| name.ends_with(suf))
}

/// Validate an environment variable name is POSIX-portable
/// (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_valid_env_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Max allowed size for a single environment variable's value (32 KiB).
pub const MAX_ENV_VALUE_BYTES: usize = 32 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_prefix_and_suffix_secrets() {
        assert!(is_secret_env_name("SECRET_ANYTHING"));
        assert!(is_secret_env_name("API_TOKEN"));
        assert!(is_secret_env_name("DB_PASSWORD"));
        assert!(is_secret_env_name("SIGNING_KEY"));
        assert!(is_secret_env_name("ROTATED_SECRET"));
        assert!(!is_secret_env_name("PATH"));
        assert!(!is_secret_env_name("HOME"));
    }

    #[test]
    fn validates_posix_env_names() {
        assert!(is_valid_env_name("FOO_BAR"));
        assert!(is_valid_env_name("_leading"));
        assert!(!is_valid_env_name("1LEADING_DIGIT"));
        assert!(!is_valid_env_name("has-dash"));
        assert!(!is_valid_env_name(""));
    }
}
