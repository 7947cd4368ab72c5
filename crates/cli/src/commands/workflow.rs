// SPDX-License-Identifier: MIT

//! `joblet workflow` — multi-job workflow submission/status (spec.md §4.8).

use crate::client::{reject, DaemonClient};
use crate::output::{render, OutputFormat};
use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use joblet_core::{UploadEntry, WorkflowId};
use joblet_wire::request::Request;
use joblet_wire::response::Response;
use joblet_wire::status::WorkflowStatusView;
use std::path::PathBuf;

#[derive(Args)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Submit a workflow definition
    Run {
        /// Path to a workflow YAML file
        file: PathBuf,
        /// Files staged into every job's workspace (repeatable)
        #[arg(long = "upload")]
        uploads: Vec<PathBuf>,
    },
    /// Show a workflow's status
    Status {
        id: String,
        /// Include the original submitted YAML text
        #[arg(long)]
        detail: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

pub async fn run(client: &DaemonClient, command: WorkflowCommand) -> Result<()> {
    match command {
        WorkflowCommand::Run { file, uploads } => {
            let yaml = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let uploads = uploads
                .into_iter()
                .map(|path| -> Result<UploadEntry> {
                    let bytes = std::fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
                    let relative_path = path.file_name().map(PathBuf::from).unwrap_or(path);
                    Ok(UploadEntry { relative_path, bytes })
                })
                .collect::<Result<Vec<_>>>()?;
            match client.send(&Request::RunWorkflow { yaml, uploads }).await? {
                Response::WorkflowAccepted { id } => println!("workflow accepted: {id}"),
                other => reject(other)?,
            }
        }
        WorkflowCommand::Status { id, detail, format } => {
            let id = WorkflowId::parse(&id)?;
            match client.send(&Request::GetWorkflowStatus { id, detail }).await? {
                Response::WorkflowStatus { status } => render(format, &status, print_status)?,
                other => reject(other)?,
            }
        }
    }
    Ok(())
}

fn print_status(status: &WorkflowStatusView) {
    println!("workflow: {}", status.id);
    for slot in &status.jobs {
        match (&slot.job_id, &slot.status) {
            (Some(job_id), Some(view)) => println!("  {}: {} ({})", slot.name, view.status, job_id),
            (Some(job_id), None) => println!("  {}: dispatched ({})", slot.name, job_id),
            (None, _) => println!("  {}: pending", slot.name),
        }
    }
    if let Some(yaml) = &status.source_yaml {
        println!("\n--- source ---\n{yaml}");
    }
}
