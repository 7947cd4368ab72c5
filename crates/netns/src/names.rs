// SPDX-License-Identifier: MIT

//! veth pair naming (spec.md §4.2 step 2: `veth-h-<short-uuid>` /
//! `veth-p-<short-uuid>`). Linux interface names are capped at 15 bytes, so
//! the uuid suffix is 8 hex chars rather than a full `ShortId`.

pub struct VethPair {
    pub host: String,
    pub peer: String,
}

impl VethPair {
    pub fn generate() -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self { host: format!("veth-h-{}", &suffix[..8]), peer: format!("veth-p-{}", &suffix[..8]) }
    }
}
