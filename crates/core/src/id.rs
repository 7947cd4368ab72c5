// SPDX-License-Identifier: MIT

//! Short, prefixed identifiers for transient, in-process-only handles
//! (timers, log subscriptions) where a full UUID would be overkill.
//!
//! Job/workflow/node identity uses real UUIDs (see [`crate::uuid_id!`]);
//! this type is for ids that never leave the node and never need to survive
//! a restart.

use std::fmt;

/// A `{prefix}-{12 hex chars}` identifier, cheap to copy (fixed 32-byte buffer).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortId {
    len: u8,
    buf: [u8; 32],
}

impl ShortId {
    pub fn new(prefix: &str) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let s = format!("{prefix}-{}", &suffix[..12]);
        Self::from_str_truncated(&s)
    }

    fn from_str_truncated(s: &str) -> Self {
        let len = s.len().min(32);
        let mut buf = [0u8; 32];
        buf[..len].copy_from_slice(&s.as_bytes()[..len]);
        Self { len: len as u8, buf }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or("")
    }
}

impl fmt::Debug for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl fmt::Display for ShortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display() {
        let id = ShortId::new("sub");
        assert!(id.as_str().starts_with("sub-"));
        assert_eq!(id.as_str().len(), "sub-".len() + 12);
    }

    #[test]
    fn two_ids_are_distinct() {
        assert_ne!(ShortId::new("tmr").as_str(), ShortId::new("tmr").as_str());
    }
}
