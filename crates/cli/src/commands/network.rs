// SPDX-License-Identifier: MIT

//! `joblet network` — custom network CRUD (spec.md §4.4).

use crate::client::{reject, DaemonClient};
use crate::output::{render, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use joblet_core::{NetworkDef, NetworkKind};
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::NetworkView;

#[derive(Args)]
pub struct NetworkArgs {
    #[command(subcommand)]
    pub command: NetworkCommand,
}

#[derive(Subcommand)]
pub enum NetworkCommand {
    /// Create a custom bridge network
    Create {
        name: String,
        /// CIDR for the bridge, e.g. 172.30.0.0/16
        #[arg(long)]
        cidr: String,
        #[arg(long)]
        bridge_if: Option<String>,
    },
    /// List configured networks
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Remove a custom network
    Delete { name: String },
}

pub async fn run(client: &DaemonClient, command: NetworkCommand) -> Result<()> {
    match command {
        NetworkCommand::Create { name, cidr, bridge_if } => {
            let def = NetworkDef {
                name: name.clone(),
                kind: NetworkKind::Custom,
                cidr: Some(cidr.parse()?),
                bridge_if,
            };
            match client.send(&Request::CreateNetwork { def }).await? {
                Response::Ok => println!("network {name} created"),
                other => reject(other)?,
            }
        }
        NetworkCommand::List { format } => match client.send(&Request::ListNetworks).await? {
            Response::Networks { networks } => render(format, &networks, print_networks)?,
            other => reject(other)?,
        },
        NetworkCommand::Delete { name } => match client.send(&Request::DeleteNetwork { name: name.clone() }).await? {
            Response::Ok => println!("network {name} deleted"),
            other => reject(other)?,
        },
    }
    Ok(())
}

fn print_networks(networks: &Vec<NetworkView>) {
    for view in networks {
        let cidr = view.def.cidr.map(|c| c.to_string()).unwrap_or_else(|| "-".to_string());
        println!("{}  {:?}  {}", view.def.name, view.def.kind, cidr);
    }
}
