// SPDX-License-Identifier: MIT

//! `joblet runtime` — registered runtime inventory (spec.md §4.6).

use crate::client::{reject, DaemonClient};
use crate::output::{render, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use joblet_core::RuntimeRef;
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::RuntimeView;

#[derive(Args)]
pub struct RuntimeArgs {
    #[command(subcommand)]
    pub command: RuntimeCommand,
}

#[derive(Subcommand)]
pub enum RuntimeCommand {
    /// List runtimes resolvable by the daemon
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Register a runtime version as available
    Register {
        name: String,
        #[arg(long, default_value = "latest")]
        version: String,
    },
}

pub async fn run(client: &DaemonClient, command: RuntimeCommand) -> Result<()> {
    match command {
        RuntimeCommand::List { format } => match client.send(&Request::ListRuntimes).await? {
            Response::Runtimes { runtimes } => render(format, &runtimes, print_runtimes)?,
            other => reject(other)?,
        },
        RuntimeCommand::Register { name, version } => {
            let def = RuntimeRef { name: name.clone(), version: version.clone() };
            match client.send(&Request::RegisterRuntime { def }).await? {
                Response::Ok => println!("runtime {name}:{version} registered"),
                other => reject(other)?,
            }
        }
    }
    Ok(())
}

fn print_runtimes(runtimes: &Vec<RuntimeView>) {
    for runtime in runtimes {
        println!("{}:{}", runtime.name, runtime.version);
    }
}
