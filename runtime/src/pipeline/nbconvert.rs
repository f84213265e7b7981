use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::{debug, warn};

use super::executor::{ExecutionError, ExecutionRequest, NotebookExecutor};
use crate::{config::ExecutorConfig, notebook::Notebook};

const STDERR_TAIL: usize = 2000;

/// Executes notebooks by piping them through `jupyter nbconvert --execute`.
///
/// The per-cell timeout is handed to the engine. On top of that the whole child
/// process gets a wall-clock deadline of one budget per code cell plus a startup
/// grace period, after which it is killed together with the kernels it started.
#[derive(Debug, Clone)]
pub struct NbconvertExecutor {
    command: String,
    leading_args: Vec<String>,
    startup_grace: Duration,
}

impl NbconvertExecutor {
    pub fn new(command: impl Into<String>, startup_grace: Duration) -> Self {
        Self {
            command: command.into(),
            leading_args: Vec::new(),
            startup_grace,
        }
    }

    /// Arguments placed before `nbconvert`, e.g. `["-m", "jupyter"]` for a `python3` command.
    pub fn with_leading_args(mut self, args: Vec<String>) -> Self {
        self.leading_args = args;
        self
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.command.clone(), config.startup_grace())
            .with_leading_args(config.args.clone())
    }

    fn args(&self, request: &ExecutionRequest) -> Vec<String> {
        let mut args = self.leading_args.clone();
        args.extend([
            "nbconvert".to_string(),
            "--to".to_string(),
            "notebook".to_string(),
            "--execute".to_string(),
            "--stdin".to_string(),
            "--stdout".to_string(),
            format!("--ExecutePreprocessor.timeout={}", request.timeout.as_secs().max(1)),
            format!("--ExecutePreprocessor.kernel_name={}", request.kernel_name),
        ]);
        args
    }

    fn deadline(&self, notebook: &Notebook, request: &ExecutionRequest) -> Duration {
        let cells = notebook.code_cell_count().max(1) as u32;
        request
            .timeout
            .saturating_mul(cells)
            .saturating_add(self.startup_grace)
    }
}

#[async_trait]
impl NotebookExecutor for NbconvertExecutor {
    async fn execute(
        &self,
        notebook: &mut Notebook,
        request: &ExecutionRequest,
    ) -> Result<(), ExecutionError> {
        let input = notebook
            .to_vec()
            .map_err(|err| ExecutionError::InvalidOutput(format!("{err:#}")))?;

        let mut command = Command::new(&self.command);
        command
            .args(self.args(request))
            .current_dir(&request.working_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Kernels are grandchildren; a group of their own lets a timeout reach them.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .map_err(|source| ExecutionError::EngineUnavailable {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // Feed stdin concurrently so a large notebook cannot fill the pipes.
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(&input).await {
                    warn!(error = %err, "failed to stream notebook to execution engine");
                }
            });
        }

        let pid = child.id();
        let deadline = self.deadline(notebook, request);
        debug!(
            command = %self.command,
            working_dir = %request.working_dir.display(),
            deadline_secs = deadline.as_secs(),
            "started execution engine"
        );

        // Dropping the child on timeout kills it.
        let output = match tokio::time::timeout(deadline, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                if let Some(pid) = pid {
                    kill_process_group(pid);
                }
                return Err(ExecutionError::Timeout(deadline));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_cell_timeout(&stderr) {
                return Err(ExecutionError::Timeout(request.timeout));
            }
            return Err(ExecutionError::EngineFailed {
                status: output.status.to_string(),
                stderr: tail(stderr.trim(), STDERR_TAIL),
            });
        }

        let executed = Notebook::from_slice(&output.stdout)
            .map_err(|err| ExecutionError::InvalidOutput(format!("{err:#}")))?;
        if executed.cell_count() != notebook.cell_count() {
            return Err(ExecutionError::InvalidOutput(format!(
                "expected {} cells, engine returned {}",
                notebook.cell_count(),
                executed.cell_count()
            )));
        }

        *notebook = executed;
        Ok(())
    }
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    // Safety: killpg only signals the group created for this engine at spawn.
    let ret = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        debug!(pid, error = %std::io::Error::last_os_error(), "engine process group already gone");
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}

fn is_cell_timeout(stderr: &str) -> bool {
    stderr.contains("CellTimeoutError") || stderr.contains("TimeoutError: Cell execution timed out")
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        let skipped: String = text.chars().skip(count - max_chars).collect();
        format!("…{skipped}")
    }
}
