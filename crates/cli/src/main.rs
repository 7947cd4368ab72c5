// SPDX-License-Identifier: MIT

//! `joblet` — CLI client for `jobletd` (SPEC_FULL.md §6 CLI client).

mod client;
mod commands;
mod output;

use clap::{Parser, Subcommand};
use client::DaemonClient;
use commands::job::JobArgs;
use commands::network::NetworkArgs;
use commands::node::NodeArgs;
use commands::runtime::RuntimeArgs;
use commands::volume::VolumeArgs;
use commands::workflow::WorkflowArgs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "joblet", version, about = "Client for the jobletd job execution daemon")]
struct Cli {
    /// Path to the daemon's Unix domain socket
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Job submission, inspection, and streaming
    Job(JobArgs),
    /// Multi-job workflow submission and status
    Workflow(WorkflowArgs),
    /// Custom network CRUD
    Network(NetworkArgs),
    /// Shared volume CRUD
    Volume(VolumeArgs),
    /// Runtime inventory
    Runtime(RuntimeArgs),
    /// Node introspection
    Node(NodeArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let socket_path = cli.socket.unwrap_or_else(client::default_socket_path);
    let client = DaemonClient::new(socket_path);

    let result = match cli.command {
        Command::Job(args) => commands::job::run(&client, args.command).await,
        Command::Workflow(args) => commands::workflow::run(&client, args.command).await,
        Command::Network(args) => commands::network::run(&client, args.command).await,
        Command::Volume(args) => commands::volume::run(&client, args.command).await,
        Command::Runtime(args) => commands::runtime::run(&client, args.command).await,
        Command::Node(args) => commands::node::run(&client, args.command).await,
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
