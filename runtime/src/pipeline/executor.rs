use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;

use crate::notebook::Notebook;

/// Everything the engine needs besides the notebook itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Per-cell time budget.
    pub timeout: Duration,
    pub kernel_name: String,
    pub working_dir: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("execution exceeded the {0:?} time budget")]
    Timeout(Duration),

    #[error("execution engine `{command}` could not be started")]
    EngineUnavailable {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("execution engine exited with {status}: {stderr}")]
    EngineFailed { status: String, stderr: String },

    #[error("execution engine returned an unreadable notebook: {0}")]
    InvalidOutput(String),

    #[error("execution engine i/o failed")]
    Io(#[from] std::io::Error),
}

/// Runs every cell of a notebook, populating outputs in place.
#[async_trait]
pub trait NotebookExecutor: Send + Sync {
    async fn execute(
        &self,
        notebook: &mut Notebook,
        request: &ExecutionRequest,
    ) -> Result<(), ExecutionError>;
}
