// SPDX-License-Identifier: MIT

//! `joblet job` — run/stop/status/list/logs/metrics (spec.md §6 unary +
//! streaming job operations).

use crate::client::{reject, DaemonClient};
use crate::output::{format_time_ago, render, OutputFormat};
use anyhow::Result;
use clap::{Args, Subcommand};
use joblet_core::{JobId, JobSpec, JobStatus, ResourceRequest, RuntimeRef, WorkflowId};
use joblet_wire::request::{JobFilter, Request};
use joblet_wire::response::Response;
use joblet_wire::status::JobStatusView;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Submit a job
    Run {
        /// Command to execute
        command: String,
        /// Arguments to the command
        args: Vec<String>,
        /// Environment variables (repeatable: --env KEY=VALUE)
        #[arg(long = "env", value_parser = parse_key_value)]
        env: Vec<(String, String)>,
        #[arg(long)]
        cpu_percent: Option<u32>,
        #[arg(long)]
        memory_mb: Option<u64>,
        #[arg(long)]
        io_bps: Option<u64>,
        #[arg(long)]
        cpu_cores: Option<String>,
        #[arg(long)]
        pids_max: Option<u32>,
        #[arg(long)]
        gpu_count: Option<u32>,
        #[arg(long)]
        gpu_memory_mb: Option<u64>,
        /// Runtime name[:version], e.g. `python:3.12`
        #[arg(long)]
        runtime: Option<String>,
        #[arg(long, default_value = "bridge")]
        network: String,
        /// Volume names to mount (repeatable)
        #[arg(long = "volume")]
        volumes: Vec<String>,
        /// Unix epoch milliseconds for a deferred start
        #[arg(long)]
        scheduled_start_ms: Option<u64>,
    },
    /// Stop a running job
    Stop { id: String },
    /// Show a job's current status
    Status {
        id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List jobs, optionally filtered
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        workflow_id: Option<String>,
        #[arg(long)]
        workflow_job_name: Option<String>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Stream a job's stdout/stderr (historical then live, until terminal)
    Logs { id: String },
    /// Stream a job's resource metrics (until terminal)
    Metrics { id: String },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))
}

fn parse_runtime(spec: &str) -> RuntimeRef {
    match spec.split_once(':') {
        Some((name, version)) => RuntimeRef { name: name.to_string(), version: version.to_string() },
        None => RuntimeRef::new(spec),
    }
}

fn parse_status(s: &str) -> Result<JobStatus> {
    Ok(match s {
        "scheduled" => JobStatus::Scheduled,
        "initializing" => JobStatus::Initializing,
        "running" => JobStatus::Running,
        "completed" => JobStatus::Completed,
        "failed" => JobStatus::Failed,
        "stopped" => JobStatus::Stopped,
        other => anyhow::bail!("unknown status `{other}`"),
    })
}

pub async fn run(client: &DaemonClient, command: JobCommand) -> Result<()> {
    match command {
        JobCommand::Run {
            command,
            args,
            env,
            cpu_percent,
            memory_mb,
            io_bps,
            cpu_cores,
            pids_max,
            gpu_count,
            gpu_memory_mb,
            runtime,
            network,
            volumes,
            scheduled_start_ms,
        } => {
            let spec = JobSpec {
                command,
                args,
                env: env.into_iter().collect::<BTreeMap<_, _>>(),
                resources: ResourceRequest {
                    cpu_percent: cpu_percent.unwrap_or_default(),
                    memory_mb: memory_mb.unwrap_or_default(),
                    io_bps: io_bps.unwrap_or_default(),
                    cpu_cores: cpu_cores.unwrap_or_default(),
                    pids_max: pids_max.unwrap_or_default(),
                    gpu_count: gpu_count.unwrap_or_default(),
                    gpu_memory_mb: gpu_memory_mb.unwrap_or_default(),
                },
                runtime: runtime.as_deref().map(parse_runtime),
                network,
                volumes: volumes.into_iter().collect::<BTreeSet<_>>(),
                uploads: vec![],
                scheduled_start_ms,
                workflow: None,
            };
            match client.send(&Request::RunJob { spec }).await? {
                Response::JobAccepted { id } => println!("job accepted: {id}"),
                other => reject(other)?,
            }
        }
        JobCommand::Stop { id } => {
            let id = parse_job_id(&id)?;
            match client.send(&Request::StopJob { id }).await? {
                Response::Ok => println!("job {id} stopped"),
                other => reject(other)?,
            }
        }
        JobCommand::Status { id, format } => {
            let id = parse_job_id(&id)?;
            match client.send(&Request::GetJobStatus { id }).await? {
                Response::JobStatus { status } => render(format, &status, print_job_status)?,
                other => reject(other)?,
            }
        }
        JobCommand::List { status, workflow_id, workflow_job_name, format } => {
            let filter = JobFilter {
                status: status.as_deref().map(parse_status).transpose()?,
                workflow_id: workflow_id.as_deref().map(parse_workflow_id).transpose()?,
                workflow_job_name,
            };
            match client.send(&Request::ListJobs { filter }).await? {
                Response::Jobs { jobs } => render(format, &jobs, |jobs| {
                    for job in jobs {
                        print_job_line(job);
                    }
                })?,
                other => reject(other)?,
            }
        }
        JobCommand::Logs { id } => {
            let id = parse_job_id(&id)?;
            client
                .stream(&Request::StreamJobLogs { id }, |response| {
                    match response {
                        Response::LogChunk(chunk) => {
                            let text = String::from_utf8_lossy(&chunk.bytes);
                            match chunk.stream {
                                joblet_wire::status::Stream::Stdout => print!("{text}"),
                                joblet_wire::status::Stream::Stderr => eprint!("{text}"),
                            }
                        }
                        Response::BackpressureDropped(d) => {
                            eprintln!("[{} chunks dropped on {:?}]", d.dropped_count, d.stream);
                        }
                        Response::Error { code, message } => eprintln!("error: {code}: {message}"),
                        Response::Done => {}
                        other => eprintln!("unexpected response: {other:?}"),
                    }
                    Ok(())
                })
                .await?;
        }
        JobCommand::Metrics { id } => {
            let id = parse_job_id(&id)?;
            client
                .stream(&Request::StreamJobMetrics { id }, |response| {
                    match response {
                        Response::MetricSample(sample) => {
                            println!(
                                "{} cpu={:.1}% mem={}MB io_r={} io_w={} pids={}",
                                sample.ts_rfc3339,
                                sample.cpu.usage_percent,
                                sample.memory.current / (1024 * 1024),
                                sample.io.rbytes,
                                sample.io.wbytes,
                                sample.pids.current,
                            );
                        }
                        Response::Error { code, message } => eprintln!("error: {code}: {message}"),
                        Response::Done => {}
                        other => eprintln!("unexpected response: {other:?}"),
                    }
                    Ok(())
                })
                .await?;
        }
    }
    Ok(())
}

fn parse_job_id(s: &str) -> Result<JobId> {
    Ok(JobId::parse(s)?)
}

fn parse_workflow_id(s: &str) -> Result<WorkflowId> {
    Ok(WorkflowId::parse(s)?)
}

fn print_job_status(status: &JobStatusView) {
    println!("id:       {}", status.id);
    println!("status:   {}", status.status);
    println!("command:  {} {}", status.command, status.args.join(" "));
    println!("pid:      {}", status.pid);
    println!("network:  {}", status.network);
    if !status.volumes.is_empty() {
        println!("volumes:  {}", status.volumes.join(", "));
    }
    if let Some(ip) = status.allocated_ip {
        println!("ip:       {ip}");
    }
    if let Some(exit_code) = status.exit_code {
        println!("exit:     {exit_code}");
    }
    if let Some(reason) = &status.failure_reason {
        println!("reason:   {reason}");
    }
    println!("started:  {}", format_time_ago(status.started_at_ms));
    println!("ended:    {}", format_time_ago(status.ended_at_ms));
}

fn print_job_line(job: &JobStatusView) {
    println!(
        "{}  {:<12}  {}  {} {}",
        job.id,
        job.status.to_string(),
        format_time_ago(job.started_at_ms),
        job.command,
        job.args.join(" "),
    );
}
