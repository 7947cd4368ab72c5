// SPDX-License-Identifier: MIT

//! `joblet volume` — shared volume CRUD (spec.md §3).

use crate::client::{reject, DaemonClient};
use crate::output::{render, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use joblet_core::{VolumeDef, VolumeKind};
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::VolumeView;
use std::path::PathBuf;

#[derive(Args)]
pub struct VolumeArgs {
    #[command(subcommand)]
    pub command: VolumeCommand,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum VolumeKindArg {
    Filesystem,
    Memory,
}

#[derive(Subcommand)]
pub enum VolumeCommand {
    /// Create a shared volume
    Create {
        name: String,
        /// Backing directory on the host filesystem
        backing_path: PathBuf,
        #[arg(long)]
        size_bytes: u64,
        #[arg(long, value_enum, default_value = "filesystem")]
        kind: VolumeKindArg,
    },
    /// List configured volumes
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Remove a shared volume
    Delete { name: String },
}

pub async fn run(client: &DaemonClient, command: VolumeCommand) -> Result<()> {
    match command {
        VolumeCommand::Create { name, backing_path, size_bytes, kind } => {
            let def = VolumeDef {
                name: name.clone(),
                size_bytes,
                kind: match kind {
                    VolumeKindArg::Filesystem => VolumeKind::Filesystem,
                    VolumeKindArg::Memory => VolumeKind::Memory,
                },
                backing_path,
            };
            match client.send(&Request::CreateVolume { def }).await? {
                Response::Ok => println!("volume {name} created"),
                other => reject(other)?,
            }
        }
        VolumeCommand::List { format } => match client.send(&Request::ListVolumes).await? {
            Response::Volumes { volumes } => render(format, &volumes, print_volumes)?,
            other => reject(other)?,
        },
        VolumeCommand::Delete { name } => match client.send(&Request::DeleteVolume { name: name.clone() }).await? {
            Response::Ok => println!("volume {name} deleted"),
            other => reject(other)?,
        },
    }
    Ok(())
}

fn print_volumes(volumes: &Vec<VolumeView>) {
    for view in volumes {
        println!("{}  {:?}  {} bytes  {}", view.def.name, view.def.kind, view.def.size_bytes, view.def.backing_path.display());
    }
}
