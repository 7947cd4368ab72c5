// SPDX-License-Identifier: MIT

//! Host bridge lifecycle (spec.md §4.4: "a dedicated bridge is created on
//! first job use" for custom networks; `joblet0` is the `bridge` built-in's
//! bridge).

use crate::commands::run;
use crate::error::NetError;
use std::net::Ipv4Addr;
use tracing::instrument;

/// Idempotent: `ip link add` on an existing name fails, so callers should
/// only invoke this on first use of a network (the daemon tracks that, not
/// this function — it just does the one-shot creation).
#[instrument]
pub async fn create(bridge_if: &str, gateway: Ipv4Addr, prefix_len: u8) -> Result<(), NetError> {
    run("ip", &["link", "add", "name", bridge_if, "type", "bridge"]).await?;
    run("ip", &["addr", "add", &format!("{gateway}/{prefix_len}"), "dev", bridge_if]).await?;
    run("ip", &["link", "set", bridge_if, "up"]).await?;
    Ok(())
}

pub async fn exists(bridge_if: &str) -> bool {
    run("ip", &["link", "show", bridge_if]).await.is_ok()
}

#[instrument]
pub async fn delete(bridge_if: &str) -> Result<(), NetError> {
    run("ip", &["link", "delete", bridge_if]).await
}
