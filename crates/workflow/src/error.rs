// SPDX-License-Identifier: MIT

use joblet_core::workflow::WorkflowGraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("failed to parse workflow yaml: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error(transparent)]
    Graph(#[from] WorkflowGraphError),
    #[error("dependency {0:?} names a job not defined in this workflow")]
    UnknownDependency(String),
}
