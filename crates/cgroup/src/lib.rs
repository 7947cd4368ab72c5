// SPDX-License-Identifier: MIT

//! The Cgroup Controller (spec.md §4.3): cgroup v2 directory lifecycle,
//! control-file writes for cpu/memory/io/pids/cpuset quotas, PID attachment,
//! and periodic stats sampling. Owns `/sys/fs/cgroup/joblet.slice/` and
//! nothing else writes it (spec.md §3 Ownership).

pub mod controller;
pub mod devices;
pub mod error;
pub mod paths;
pub mod stats;
pub mod writer;

pub use controller::CgroupController;
pub use error::CgroupError;
pub use paths::{job_cgroup_dir, DEFAULT_CGROUP_ROOT, SLICE_NAME};
pub use stats::{CpuStat, IoStat, MemoryStat, PidsStat, PressureStat, Sample, Sampler};
