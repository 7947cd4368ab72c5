// SPDX-License-Identifier: MIT

//! The Lifecycle Manager (LM, spec.md §3/§4.1/§9): a single-writer actor
//! that owns the job table, the cgroup/network controllers, and every
//! job's log hub. Driven by a [`Message`] channel so `CgroupController`'s
//! `&mut self` requirement and the launcher's multi-`.await` use of it
//! never have to cross an `Arc<Mutex<_>>` boundary — everything that
//! touches cgroups or launches a job runs inline in [`Engine::run`].

mod launch;
pub mod metrics;

use crate::config::Config;
use joblet_cgroup::CgroupController;
use joblet_core::workflow::{Workflow, WorkflowJobDef};
use joblet_core::{
    Clock, Effect, Event, Job, JobId, JobSpec, JobStatus, LookupError, NetworkDef, NodeId,
    RuntimeRef, StopError, SubmitError, SystemClock, TimerId, TimerKind, UploadEntry, VolumeDef,
    WorkflowId,
};
use joblet_logs::{LogEvent, LogHub, OverflowPolicy};
use joblet_net::NetworkOrchestrator;
use joblet_runtime::RuntimeResolver;
use joblet_storage::{JobRecord, StateClient};
use joblet_wire::request::JobFilter;
use joblet_wire::status::{
    JobStatusView, LogChunk, MetricSample, NodeInfo, RuntimeView, Stream, WorkflowJobSlot, WorkflowStatusView,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

/// Subscription handed back for `StreamJobLogs`: backlog plus the two live
/// per-stream receivers (spec.md §4.5 "replay then live").
pub struct LogSubscription {
    pub backlog: Vec<LogChunk>,
    pub stdout_rx: mpsc::Receiver<LogEvent>,
    pub stderr_rx: mpsc::Receiver<LogEvent>,
}

pub enum Command {
    RunJob { spec: JobSpec, reply: oneshot::Sender<Result<JobId, SubmitError>> },
    StopJob { id: JobId, reply: oneshot::Sender<Result<(), StopError>> },
    GetJobStatus { id: JobId, reply: oneshot::Sender<Result<JobStatusView, LookupError>> },
    ListJobs { filter: JobFilter, reply: oneshot::Sender<Vec<JobStatusView>> },
    StreamJobLogs { id: JobId, reply: oneshot::Sender<Result<LogSubscription, LookupError>> },
    StreamJobMetrics { id: JobId, reply: oneshot::Sender<Result<mpsc::Receiver<MetricSample>, LookupError>> },
    RunWorkflow { yaml: String, uploads: Vec<UploadEntry>, reply: oneshot::Sender<Result<WorkflowId, SubmitError>> },
    GetWorkflowStatus { id: WorkflowId, detail: bool, reply: oneshot::Sender<Result<WorkflowStatusView, LookupError>> },
    CreateNetwork { def: NetworkDef, reply: oneshot::Sender<Result<(), SubmitError>> },
    ListNetworks { reply: oneshot::Sender<Vec<NetworkDef>> },
    DeleteNetwork { name: String, reply: oneshot::Sender<Result<(), LookupError>> },
    CreateVolume { def: VolumeDef, reply: oneshot::Sender<Result<(), SubmitError>> },
    ListVolumes { reply: oneshot::Sender<Vec<VolumeDef>> },
    DeleteVolume { name: String, reply: oneshot::Sender<Result<(), LookupError>> },
    ListRuntimes { reply: oneshot::Sender<Vec<RuntimeView>> },
    RegisterRuntime { def: RuntimeRef, reply: oneshot::Sender<Result<(), SubmitError>> },
    GetNodeInfo { reply: oneshot::Sender<NodeInfo> },
}

pub enum Message {
    Command(Command),
    Event { job_id: JobId, event: Event },
    ProcessExited { job_id: JobId, exit_code: i32 },
    LogData { job_id: JobId, stream: Stream, data: Vec<u8> },
    LogEof { job_id: JobId, stream: Stream },
}

/// Client-facing handle: every call is a `Message::Command` round trip
/// through a `oneshot` reply channel, same shape as the teacher's
/// executor-driven command surface.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<Message>,
}

macro_rules! command {
    ($self:ident, $variant:ident { $($field:ident: $value:expr),* $(,)? }) => {{
        let (reply, rx) = oneshot::channel();
        let _ = $self.tx.send(Message::Command(Command::$variant { $($field: $value,)* reply })).await;
        rx.await.unwrap_or_else(|_| panic!("engine dropped a {} reply channel", stringify!($variant)))
    }};
}

impl EngineHandle {
    pub fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    pub async fn run_job(&self, spec: JobSpec) -> Result<JobId, SubmitError> {
        command!(self, RunJob { spec: spec })
    }

    pub async fn stop_job(&self, id: JobId) -> Result<(), StopError> {
        command!(self, StopJob { id: id })
    }

    pub async fn get_job_status(&self, id: JobId) -> Result<JobStatusView, LookupError> {
        command!(self, GetJobStatus { id: id })
    }

    pub async fn list_jobs(&self, filter: JobFilter) -> Vec<JobStatusView> {
        command!(self, ListJobs { filter: filter })
    }

    pub async fn stream_job_logs(&self, id: JobId) -> Result<LogSubscription, LookupError> {
        command!(self, StreamJobLogs { id: id })
    }

    pub async fn stream_job_metrics(&self, id: JobId) -> Result<mpsc::Receiver<MetricSample>, LookupError> {
        command!(self, StreamJobMetrics { id: id })
    }

    pub async fn run_workflow(&self, yaml: String, uploads: Vec<UploadEntry>) -> Result<WorkflowId, SubmitError> {
        command!(self, RunWorkflow { yaml: yaml, uploads: uploads })
    }

    pub async fn get_workflow_status(&self, id: WorkflowId, detail: bool) -> Result<WorkflowStatusView, LookupError> {
        command!(self, GetWorkflowStatus { id: id, detail: detail })
    }

    pub async fn create_network(&self, def: NetworkDef) -> Result<(), SubmitError> {
        command!(self, CreateNetwork { def: def })
    }

    pub async fn list_networks(&self) -> Vec<NetworkDef> {
        command!(self, ListNetworks {})
    }

    pub async fn delete_network(&self, name: String) -> Result<(), LookupError> {
        command!(self, DeleteNetwork { name: name })
    }

    pub async fn create_volume(&self, def: VolumeDef) -> Result<(), SubmitError> {
        command!(self, CreateVolume { def: def })
    }

    pub async fn list_volumes(&self) -> Vec<VolumeDef> {
        command!(self, ListVolumes {})
    }

    pub async fn delete_volume(&self, name: String) -> Result<(), LookupError> {
        command!(self, DeleteVolume { name: name })
    }

    pub async fn list_runtimes(&self) -> Vec<RuntimeView> {
        command!(self, ListRuntimes {})
    }

    pub async fn register_runtime(&self, def: RuntimeRef) -> Result<(), SubmitError> {
        command!(self, RegisterRuntime { def: def })
    }

    pub async fn get_node_info(&self) -> NodeInfo {
        command!(self, GetNodeInfo {})
    }
}

struct WorkflowState {
    scheduler: joblet_workflow::scheduler::WorkflowScheduler,
}

pub struct Engine {
    node_id: NodeId,
    config: Config,
    started_at: Instant,
    clock: SystemClock,
    jobs: HashMap<JobId, Job>,
    /// Jobs with a SIGTERM/SIGKILL in flight; the next observed exit lands
    /// on `Stopped` via `apply_stopped_exit` instead of `Completed`/`Failed`
    /// (spec.md §5 — `decision::apply`'s `ProcessExited` arm never produces
    /// `Stopped` on its own).
    pending_stop: HashSet<JobId>,
    cgroup: CgroupController,
    network: NetworkOrchestrator,
    runtime_resolver: RuntimeResolver,
    storage: Arc<dyn StateClient>,
    log_hubs: HashMap<JobId, LogHub>,
    job_networks: HashMap<JobId, joblet_net::JobNetwork>,
    metrics_subscribers: HashMap<JobId, Vec<mpsc::Sender<MetricSample>>>,
    metrics_cancels: HashMap<JobId, CancellationToken>,
    timers: HashMap<TimerId, CancellationToken>,
    volumes: HashMap<String, VolumeDef>,
    workflows: HashMap<WorkflowId, WorkflowState>,
    workflow_job_names: HashMap<JobId, (WorkflowId, String)>,
    self_tx: mpsc::Sender<Message>,
    tick_tx: mpsc::Sender<JobId>,
}

impl Engine {
    pub fn new(
        node_id: NodeId,
        config: Config,
        storage: Arc<dyn StateClient>,
        self_tx: mpsc::Sender<Message>,
        tick_tx: mpsc::Sender<JobId>,
    ) -> Self {
        Self {
            node_id,
            cgroup: CgroupController::new(config.cgroup_root.clone()),
            runtime_resolver: RuntimeResolver::new(config.runtime_root.clone()),
            config,
            started_at: Instant::now(),
            clock: SystemClock,
            jobs: HashMap::new(),
            pending_stop: HashSet::new(),
            network: NetworkOrchestrator::new(),
            storage,
            log_hubs: HashMap::new(),
            job_networks: HashMap::new(),
            metrics_subscribers: HashMap::new(),
            metrics_cancels: HashMap::new(),
            timers: HashMap::new(),
            volumes: HashMap::new(),
            workflows: HashMap::new(),
            workflow_job_names: HashMap::new(),
            self_tx,
            tick_tx,
        }
    }

    /// Reconstructs persisted state at startup (spec.md §4.7 "Startup
    /// reconciliation"): every non-terminal record is definitively dead
    /// (its process can't have survived a daemon restart) and is marked
    /// FAILED. The full `Job` (spec, env) isn't durable — only the
    /// projection `JobRecord` carries — so these records are re-persisted
    /// for audit continuity but are not rehydrated into the live job table;
    /// `GetJobStatus` for a pre-restart job id returns `NotFound` after a
    /// restart, a deliberate simplification (see DESIGN.md).
    pub async fn reconcile_on_startup(&self) {
        match self.storage.list_since(0).await {
            Ok(records) => {
                let now_ms = self.clock.epoch_ms();
                for mut record in records {
                    if !record.status.is_terminal() {
                        record.mark_failed_on_restart(now_ms);
                        self.storage.upsert(record).await;
                    }
                }
            }
            Err(e) => error!(error = %e, "startup reconciliation failed to list persisted jobs"),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::Receiver<Message>, mut tick_rx: mpsc::Receiver<JobId>) {
        loop {
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(Message::Command(cmd)) => self.handle_command(cmd).await,
                        Some(Message::Event { job_id, event }) => self.apply_event(job_id, event).await,
                        Some(Message::ProcessExited { job_id, exit_code }) => self.handle_process_exited(job_id, exit_code).await,
                        Some(Message::LogData { job_id, stream, data }) => self.handle_log_data(job_id, stream, data),
                        Some(Message::LogEof { .. }) => {}
                        None => return,
                    }
                }
                Some(job_id) = tick_rx.recv() => self.handle_metrics_tick(job_id).await,
            }
        }
    }

    fn handle_log_data(&mut self, job_id: JobId, stream: Stream, data: Vec<u8>) {
        if let Some(hub) = self.log_hubs.get_mut(&job_id) {
            hub.ingest(stream, &data, now_rfc3339);
        }
    }

    async fn handle_process_exited(&mut self, job_id: JobId, exit_code: i32) {
        if self.pending_stop.remove(&job_id) {
            let now_ms = self.clock.epoch_ms();
            let Some(job) = self.jobs.get_mut(&job_id) else { return };
            let effects = joblet_core::decision::apply_stopped_exit(job, exit_code, now_ms);
            self.run_effects(job_id, effects).await;
        } else {
            self.apply_event(job_id, Event::ProcessExited { job_id, exit_code }).await;
        }
    }

    #[instrument(skip(self))]
    async fn apply_event(&mut self, job_id: JobId, event: Event) {
        let now_ms = self.clock.epoch_ms();
        let Some(job) = self.jobs.get_mut(&job_id) else {
            warn!(%job_id, "event for unknown job, dropping");
            return;
        };
        let effects = joblet_core::decision::apply(job, event, now_ms);
        self.run_effects(job_id, effects).await;
    }

    async fn run_effects(&mut self, job_id: JobId, effects: Vec<Effect>) {
        for effect in effects {
            self.execute_effect(job_id, effect).await;
        }
    }

    /// Dispatches one `Effect`, mirroring the teacher's
    /// `Executor::execute`/`execute_inner` split: a timed, logged outer
    /// call around the actual side effect.
    async fn execute_effect(&mut self, job_id: JobId, effect: Effect) {
        let name = effect.name();
        let start = Instant::now();
        self.execute_effect_inner(job_id, effect).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        info!(%job_id, effect = name, elapsed_ms, "effect executed");
    }

    async fn execute_effect_inner(&mut self, job_id: JobId, effect: Effect) {
        match effect {
            Effect::Launch { job_id } => self.do_launch(job_id).await,
            Effect::SendSignal { job_id, signal } => self.do_send_signal(job_id, signal),
            Effect::Cleanup { job_id } => self.do_cleanup(job_id).await,
            Effect::SetTimer { id, duration } => self.do_set_timer(id, duration),
            Effect::CancelTimer { id } => self.do_cancel_timer(id),
            Effect::PersistJob { job_id } => self.do_persist_job(job_id).await,
            Effect::DeletePersistedJob { job_id } => self.storage.delete(job_id).await,
            Effect::ReevaluateWorkflow { job_id } => self.do_reevaluate_workflow(job_id).await,
        }
    }

    async fn do_launch(&mut self, job_id: JobId) {
        let Some(job) = self.jobs.get(&job_id).cloned() else { return };
        if self.log_hubs.get(&job_id).is_none() {
            let persist_dir = self.config.log_root.join(job_id.to_string());
            match LogHub::open(job_id, persist_dir, self.config.log_ring_capacity_bytes, OverflowPolicy::default()) {
                Ok(hub) => {
                    self.log_hubs.insert(job_id, hub);
                }
                Err(e) => warn!(%job_id, error = %e, "failed to open log hub"),
            }
        }
        let outcome = launch::run(
            &job,
            &self.config.jobs_root,
            &self.runtime_resolver,
            &self.volumes,
            &mut self.cgroup,
            &self.network,
            self.self_tx.clone(),
        )
        .await;
        match outcome {
            launch::LaunchOutcome::Succeeded { pid, cgroup_path, job_net } => {
                if let Some(job) = self.jobs.get_mut(&job_id) {
                    job.cgroup_path = Some(cgroup_path);
                    job.allocated_ip = job_net.ip.map(std::net::IpAddr::V4);
                }
                self.job_networks.insert(job_id, job_net);
                self.apply_event(job_id, Event::LaunchSucceeded { job_id, pid }).await;
            }
            launch::LaunchOutcome::Failed { reason } => {
                self.apply_event(job_id, Event::LaunchFailed { job_id, reason, exit_code: None }).await;
            }
        }
    }

    fn do_send_signal(&mut self, job_id: JobId, signal: i32) {
        if signal == libc_sigterm() {
            self.pending_stop.insert(job_id);
        }
        let Some(job) = self.jobs.get(&job_id) else { return };
        if job.pid == 0 {
            return;
        }
        let pid = nix::unistd::Pid::from_raw(job.pid as i32);
        let Ok(sig) = nix::sys::signal::Signal::try_from(signal) else { return };
        if let Err(e) = nix::sys::signal::kill(pid, sig) {
            warn!(%job_id, pid = job.pid, error = %e, "failed to signal job");
        }
    }

    async fn do_cleanup(&mut self, job_id: JobId) {
        if let Some(cancel) = self.metrics_cancels.remove(&job_id) {
            cancel.cancel();
        }
        self.metrics_subscribers.remove(&job_id);

        if let Some(job_net) = self.job_networks.remove(&job_id) {
            let _ = self.network.teardown_job_network(job_id, &job_net).await;
        }
        let _ = self.cgroup.cleanup(job_id);
        launch::cleanup_workspace(job_id, &self.config.jobs_root);

        if let Some(hub) = self.log_hubs.remove(&job_id) {
            tokio::spawn(hub.close());
        }
    }

    fn do_set_timer(&mut self, id: TimerId, duration: std::time::Duration) {
        let cancel = CancellationToken::new();
        self.timers.insert(id, cancel.clone());
        let tx = self.self_tx.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(duration) => {
                    let event = match id.kind {
                        TimerKind::ScheduledStart => Some(Event::ScheduledStartFired { job_id: id.job_id }),
                        TimerKind::StopGrace => Some(Event::StopGraceExpired { job_id: id.job_id }),
                        TimerKind::StatsSample | TimerKind::RendezvousTimeout => None,
                    };
                    if let Some(event) = event {
                        let _ = tx.send(Message::Event { job_id: id.job_id, event }).await;
                    }
                }
            }
        });
    }

    fn do_cancel_timer(&mut self, id: TimerId) {
        if let Some(cancel) = self.timers.remove(&id) {
            cancel.cancel();
        }
    }

    async fn do_persist_job(&mut self, job_id: JobId) {
        if let Some(job) = self.jobs.get(&job_id) {
            let now_ms = self.clock.epoch_ms();
            self.storage.upsert(JobRecord::from_job(job, now_ms)).await;
        }
    }

    async fn do_reevaluate_workflow(&mut self, job_id: JobId) {
        let Some((workflow_id, name)) = self.workflow_job_names.get(&job_id).cloned() else { return };
        let Some(job) = self.jobs.get(&job_id) else { return };
        let (status, exit_code) = (job.status, job.exit_code);
        let Some(state) = self.workflows.get_mut(&workflow_id) else { return };
        let update = state.scheduler.on_terminal(&name, status, exit_code);
        let newly_ready = update.newly_ready;
        let newly_failed = update.newly_failed;
        for ready_name in newly_ready {
            self.dispatch_workflow_job(workflow_id, &ready_name).await;
        }
        for (failed_name, reason) in newly_failed {
            self.dispatch_workflow_failure(workflow_id, &failed_name, reason).await;
        }
    }

    async fn dispatch_workflow_job(&mut self, workflow_id: WorkflowId, name: &str) {
        let Some(state) = self.workflows.get(&workflow_id) else { return };
        let Some(def) = state.scheduler.workflow().jobs.iter().find(|j| j.name == name) else { return };
        let mut spec = def.spec.clone();
        spec.workflow = Some((workflow_id, name.to_string()));
        let job_id = self.admit_job(spec);
        self.workflow_job_names.insert(job_id, (workflow_id, name.to_string()));
        if let Some(state) = self.workflows.get_mut(&workflow_id) {
            state.scheduler.workflow_mut().submitted.insert(name.to_string(), job_id);
        }
        self.start_job(job_id).await;
    }

    async fn dispatch_workflow_failure(&mut self, workflow_id: WorkflowId, name: &str, reason: &'static str) {
        let Some(state) = self.workflows.get(&workflow_id) else { return };
        let Some(def) = state.scheduler.workflow().jobs.iter().find(|j| j.name == name) else { return };
        let mut spec = def.spec.clone();
        spec.workflow = Some((workflow_id, name.to_string()));
        let job_id = self.admit_job(spec);
        self.workflow_job_names.insert(job_id, (workflow_id, name.to_string()));
        if let Some(state) = self.workflows.get_mut(&workflow_id) {
            state.scheduler.workflow_mut().submitted.insert(name.to_string(), job_id);
        }
        self.apply_event(job_id, Event::DependencyUnsatisfiable { job_id, reason: reason.to_string() }).await;
    }

    async fn handle_metrics_tick(&mut self, job_id: JobId) {
        let Some(job) = self.jobs.get(&job_id) else { return };
        if job.status.is_terminal() {
            return;
        }
        let sample = match self.cgroup.sample(job_id) {
            Ok(s) => s,
            Err(e) => {
                warn!(%job_id, error = %e, "metrics sample failed");
                return;
            }
        };
        let view = metrics::to_wire(job_id, &sample, now_rfc3339());
        let Some(subscribers) = self.metrics_subscribers.get_mut(&job_id) else { return };
        subscribers.retain(|tx| tx.try_send(view.clone()).is_ok());
        if subscribers.is_empty() {
            if let Some(cancel) = self.metrics_cancels.remove(&job_id) {
                cancel.cancel();
            }
        }
    }

    // ---- Command handlers ----

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::RunJob { spec, reply } => {
                let result = self.validate_job_spec(&spec).map(|()| self.admit_job(spec));
                if let Ok(job_id) = result.as_ref() {
                    self.start_job(*job_id).await;
                }
                let _ = reply.send(result);
            }
            Command::StopJob { id, reply } => {
                let result = if self.jobs.contains_key(&id) {
                    self.apply_event(id, Event::StopRequested { job_id: id }).await;
                    Ok(())
                } else {
                    Err(StopError::NotFound(id.to_string()))
                };
                let _ = reply.send(result);
            }
            Command::GetJobStatus { id, reply } => {
                let result = self
                    .jobs
                    .get(&id)
                    .map(JobStatusView::from)
                    .ok_or_else(|| LookupError::JobNotFound(id.to_string()));
                let _ = reply.send(result);
            }
            Command::ListJobs { filter, reply } => {
                let views = self
                    .jobs
                    .values()
                    .filter(|job| job_matches_filter(job, &filter))
                    .map(JobStatusView::from)
                    .collect();
                let _ = reply.send(views);
            }
            Command::StreamJobLogs { id, reply } => {
                let result = if !self.jobs.contains_key(&id) {
                    Err(LookupError::JobNotFound(id.to_string()))
                } else if let Some(hub) = self.log_hubs.get_mut(&id) {
                    let (mut backlog, stdout_rx) = hub.subscribe(Stream::Stdout, 0);
                    let (stderr_backlog, stderr_rx) = hub.subscribe(Stream::Stderr, 0);
                    backlog.extend(stderr_backlog);
                    Ok(LogSubscription { backlog, stdout_rx, stderr_rx })
                } else {
                    let (_stdout_tx, stdout_rx) = mpsc::channel(1);
                    let (_stderr_tx, stderr_rx) = mpsc::channel(1);
                    Ok(LogSubscription { backlog: Vec::new(), stdout_rx, stderr_rx })
                };
                let _ = reply.send(result);
            }
            Command::StreamJobMetrics { id, reply } => {
                let result = if !self.jobs.contains_key(&id) {
                    Err(LookupError::JobNotFound(id.to_string()))
                } else {
                    let (tx, rx) = mpsc::channel(32);
                    self.metrics_subscribers.entry(id).or_default().push(tx);
                    if !self.metrics_cancels.contains_key(&id) {
                        let cancel = CancellationToken::new();
                        metrics::spawn_ticker(
                            id,
                            std::time::Duration::from_millis(self.config.metrics_sample_interval_ms),
                            self.tick_tx.clone(),
                            cancel.clone(),
                        );
                        self.metrics_cancels.insert(id, cancel);
                    }
                    Ok(rx)
                };
                let _ = reply.send(result);
            }
            Command::RunWorkflow { yaml, uploads, reply } => {
                let result = self.start_workflow(yaml, uploads).await;
                let _ = reply.send(result);
            }
            Command::GetWorkflowStatus { id, detail, reply } => {
                let result = self.workflow_status(id, detail);
                let _ = reply.send(result);
            }
            Command::CreateNetwork { def, reply } => {
                let result = self.create_network(def);
                let _ = reply.send(result);
            }
            Command::ListNetworks { reply } => {
                let _ = reply.send(self.network.list());
            }
            Command::DeleteNetwork { name, reply } => {
                let result = if self.network.exists(&name) {
                    self.network.unregister(&name);
                    Ok(())
                } else {
                    Err(LookupError::JobNotFound(name))
                };
                let _ = reply.send(result);
            }
            Command::CreateVolume { def, reply } => {
                let result = self.create_volume(def);
                let _ = reply.send(result);
            }
            Command::ListVolumes { reply } => {
                let _ = reply.send(self.volumes.values().cloned().collect());
            }
            Command::DeleteVolume { name, reply } => {
                let result = self.delete_volume(&name);
                let _ = reply.send(result);
            }
            Command::ListRuntimes { reply } => {
                let _ = reply.send(self.list_runtimes());
            }
            Command::RegisterRuntime { def, reply } => {
                let result = self.runtime_resolver.resolve(&def).map(|_| ()).map_err(|e| {
                    SubmitError::ReferenceNotFound { kind: "runtime", name: format!("{}:{} ({e})", def.name, def.version) }
                });
                let _ = reply.send(result);
            }
            Command::GetNodeInfo { reply } => {
                let info = NodeInfo {
                    node_id: self.node_id,
                    uptime_secs: self.started_at.elapsed().as_secs(),
                    active_job_count: self.jobs.values().filter(|j| !j.status.is_terminal()).count(),
                };
                let _ = reply.send(info);
            }
        }
    }

    fn validate_job_spec(&self, spec: &JobSpec) -> Result<(), SubmitError> {
        if spec.command.trim().is_empty() {
            return Err(SubmitError::InvalidSpec("command must not be empty".into()));
        }
        if !self.network.exists(&spec.network) {
            return Err(SubmitError::ReferenceNotFound { kind: "network", name: spec.network.clone() });
        }
        for name in &spec.volumes {
            if !self.volumes.contains_key(name) {
                return Err(SubmitError::ReferenceNotFound { kind: "volume", name: name.clone() });
            }
        }
        Ok(())
    }

    /// Inserts a freshly-specced job into the table. Does not launch it —
    /// callers follow up with [`Engine::start_job`] (or, for dependency
    /// failures, route straight to `DependencyUnsatisfiable`).
    fn admit_job(&mut self, spec: JobSpec) -> JobId {
        let job_id = JobId::new();
        let job = Job::new(job_id, self.node_id, spec);
        self.jobs.insert(job_id, job);
        job_id
    }

    /// Drives a newly-admitted job's first transition (spec.md §4.1
    /// `submit`): a scheduled job gets a deferred-start timer, an
    /// immediate one gets `Launch`+`PersistJob` directly — the same pair
    /// `Event::ScheduledStartFired`'s handler in `decision::apply` would
    /// produce, without needing a synthetic event to get there.
    async fn start_job(&mut self, job_id: JobId) {
        let now_ms = self.clock.epoch_ms();
        let Some(job) = self.jobs.get(&job_id) else { return };
        match job.status {
            JobStatus::Scheduled => {
                let due = job.spec.scheduled_start_ms.unwrap_or(now_ms);
                if due <= now_ms {
                    self.apply_event(job_id, Event::ScheduledStartFired { job_id }).await;
                } else {
                    let duration = std::time::Duration::from_millis(due - now_ms);
                    self.execute_effect(job_id, Effect::set_timer(job_id, TimerKind::ScheduledStart, duration)).await;
                    self.execute_effect(job_id, Effect::PersistJob { job_id }).await;
                }
            }
            JobStatus::Initializing => {
                self.run_effects(job_id, vec![Effect::Launch { job_id }, Effect::PersistJob { job_id }]).await;
            }
            _ => {}
        }
    }

    async fn start_workflow(&mut self, yaml: String, uploads: Vec<UploadEntry>) -> Result<WorkflowId, SubmitError> {
        let mut workflow = joblet_workflow::parse::parse(&yaml)
            .map_err(|e| SubmitError::InvalidWorkflowGraph(e.to_string()))?;
        if !uploads.is_empty() {
            for job in &mut workflow.jobs {
                job.spec.uploads.extend(uploads.iter().cloned());
            }
        }
        let workflow_id = workflow.id;
        let mut scheduler = joblet_workflow::scheduler::WorkflowScheduler::new(workflow)
            .map_err(|e| SubmitError::InvalidWorkflowGraph(e.to_string()))?;
        let initial_ready = scheduler.initial_ready();
        self.workflows.insert(workflow_id, WorkflowState { scheduler });
        for name in initial_ready {
            self.dispatch_workflow_job(workflow_id, &name).await;
        }
        Ok(workflow_id)
    }

    fn workflow_status(&self, id: WorkflowId, detail: bool) -> Result<WorkflowStatusView, LookupError> {
        let state = self.workflows.get(&id).ok_or_else(|| LookupError::WorkflowNotFound(id.to_string()))?;
        let workflow = state.scheduler.workflow();
        let jobs = workflow
            .jobs
            .iter()
            .map(|def: &WorkflowJobDef| {
                let job_id = workflow.submitted.get(&def.name).copied();
                let status = job_id.and_then(|jid| self.jobs.get(&jid)).map(JobStatusView::from);
                WorkflowJobSlot { name: def.name.clone(), job_id, status }
            })
            .collect();
        Ok(WorkflowStatusView {
            id,
            jobs,
            source_yaml: if detail { Some(workflow.source_yaml.clone()) } else { None },
        })
    }

    fn create_network(&self, def: NetworkDef) -> Result<(), SubmitError> {
        for existing in self.network.list() {
            if existing.overlaps(&def) {
                return Err(SubmitError::NetworkOverlap(def.name.clone()));
            }
        }
        self.network.register(def);
        Ok(())
    }

    fn create_volume(&mut self, def: VolumeDef) -> Result<(), SubmitError> {
        if self.volumes.contains_key(&def.name) {
            return Err(SubmitError::InvalidSpec(format!("volume {:?} already exists", def.name)));
        }
        std::fs::create_dir_all(&def.backing_path)
            .map_err(|e| SubmitError::InvalidSpec(format!("failed to create volume directory: {e}")))?;
        self.volumes.insert(def.name.clone(), def);
        Ok(())
    }

    fn delete_volume(&mut self, name: &str) -> Result<(), LookupError> {
        let Some(def) = self.volumes.remove(name) else {
            return Err(LookupError::JobNotFound(name.to_string()));
        };
        if let Err(e) = std::fs::remove_dir_all(&def.backing_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(volume = %name, error = %e, "failed to remove volume directory");
            }
        }
        Ok(())
    }

    fn list_runtimes(&self) -> Vec<RuntimeView> {
        let Ok(entries) = std::fs::read_dir(&self.config.runtime_root) else { return Vec::new() };
        entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter_map(|dir_name| {
                let (name, version) = dir_name.rsplit_once('-')?;
                Some(RuntimeView { name: name.to_string(), version: version.to_string() })
            })
            .collect()
    }
}

fn job_matches_filter(job: &Job, filter: &JobFilter) -> bool {
    if let Some(status) = filter.status {
        if job.status != status {
            return false;
        }
    }
    if let Some(workflow_id) = filter.workflow_id {
        if job.spec.workflow.as_ref().map(|(id, _)| *id) != Some(workflow_id) {
            return false;
        }
    }
    if let Some(name) = &filter.workflow_job_name {
        if job.spec.workflow.as_ref().map(|(_, n)| n) != Some(name) {
            return false;
        }
    }
    true
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn libc_sigterm() -> i32 {
    nix::sys::signal::Signal::SIGTERM as i32
}
