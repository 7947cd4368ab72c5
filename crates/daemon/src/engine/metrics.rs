// SPDX-License-Identifier: MIT

//! Maps a cgroup stats [`Sample`] onto the wire's [`MetricSample`] and
//! drives the per-job sampling ticker that feeds live `StreamJobMetrics`
//! subscribers (spec.md §4.3).

use joblet_cgroup::stats::Sample;
use joblet_core::JobId;
use joblet_wire::status::{CpuSample, IoSample, MemorySample, MetricSample, PidsSample, PressureSample};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn to_wire(job_id: JobId, sample: &Sample, ts_rfc3339: String) -> MetricSample {
    MetricSample {
        job_id,
        ts_rfc3339,
        cpu: CpuSample { usage_percent: sample.cpu.usage_percent, throttled_percent: sample.cpu.throttled_percent },
        memory: MemorySample {
            current: sample.memory.current,
            peak: sample.memory.peak,
            anon: sample.memory.anon,
            file: sample.memory.file,
            oom_events: sample.memory.oom_events,
        },
        io: IoSample {
            rbytes: sample.io.rbytes,
            wbytes: sample.io.wbytes,
            rios: sample.io.rios,
            wios: sample.io.wios,
        },
        pids: PidsSample { current: sample.pids.current, max: sample.pids.max },
        pressure: PressureSample {
            cpu_avg10: sample.cpu_pressure.avg10,
            memory_avg10: sample.memory_pressure.avg10,
            io_avg10: sample.io_pressure.avg10,
        },
    }
}

/// Spawns the periodic tick that asks the engine to sample `job_id`, until
/// cancelled. The engine owns the actual `CgroupController::sample` call
/// (it needs `&mut self`); this task only nudges it on a schedule.
pub fn spawn_ticker(
    job_id: JobId,
    interval: Duration,
    tick_tx: mpsc::Sender<JobId>,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(interval) => {
                    if tick_tx.send(job_id).await.is_err() {
                        return;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use joblet_cgroup::stats::{CpuStat, MemoryStat};

    #[test]
    fn maps_cpu_and_memory_fields_through() {
        let mut sample = Sample::default();
        sample.cpu = CpuStat { usage_percent: 12.5, throttled_percent: 1.0 };
        sample.memory = MemoryStat { current: 100, peak: 200, anon: 50, file: 50, oom_events: 0 };
        let view = to_wire(JobId::new(), &sample, "2026-01-01T00:00:00Z".into());
        assert_eq!(view.cpu.usage_percent, 12.5);
        assert_eq!(view.memory.peak, 200);
    }
}
