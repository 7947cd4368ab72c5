// SPDX-License-Identifier: MIT

//! `joblet node info` — node-level introspection (SPEC_FULL.md §3.1).

use crate::client::{reject, DaemonClient};
use crate::output::{render, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::NodeInfo;

#[derive(Args)]
pub struct NodeArgs {
    #[command(subcommand)]
    pub command: NodeCommand,
}

#[derive(Subcommand)]
pub enum NodeCommand {
    /// Show the daemon's node id, uptime, and active job count
    Info {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

pub async fn run(client: &DaemonClient, command: NodeCommand) -> Result<()> {
    match command {
        NodeCommand::Info { format } => match client.send(&Request::GetNodeInfo).await? {
            Response::NodeInfo { info } => render(format, &info, print_info)?,
            other => reject(other)?,
        },
    }
    Ok(())
}

fn print_info(info: &NodeInfo) {
    println!("node_id:           {}", info.node_id);
    println!("uptime_secs:       {}", info.uptime_secs);
    println!("active_job_count:  {}", info.active_job_count);
}
