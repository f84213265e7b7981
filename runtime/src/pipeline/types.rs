use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::notebook::Notebook;

/// One notebook to execute, optionally persisted to `output` afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub input: PathBuf,
    #[serde(default)]
    pub output: Option<PathBuf>,
}

impl Job {
    pub fn new<P>(input: P, output: Option<P>) -> Self
    where
        P: Into<PathBuf>,
    {
        Self {
            input: input.into(),
            output: output.map(Into::into),
        }
    }

    /// Directory the kernel runs in: the input's parent, or `.` for bare file names.
    pub fn working_dir(&self) -> PathBuf {
        match self.input.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// File a stage operates on: the output for `Save`, the input otherwise.
    pub fn stage_path(&self, stage: Stage) -> &Path {
        match (stage, self.output.as_deref()) {
            (Stage::Save, Some(output)) => output,
            _ => &self.input,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Execute,
    Save,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Execute => "execute",
            Stage::Save => "save",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Succeeded,
    NotFound,
    LoadFailure,
    ExecutionFailure,
    SaveFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum JobError {
    #[error("notebook not found at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to load notebook {}: {cause}", path.display())]
    LoadFailure { path: PathBuf, cause: String },

    #[error("failed to execute notebook {}: {cause}", path.display())]
    ExecutionFailure { path: PathBuf, cause: String },

    #[error("failed to save executed notebook to {}: {cause}", path.display())]
    SaveFailure { path: PathBuf, cause: String },
}

impl JobError {
    /// Classify a stage failure. Load errors rooted in a missing file become `NotFound`.
    pub fn from_stage(stage: Stage, path: &Path, err: &anyhow::Error) -> Self {
        let path = path.to_path_buf();
        let cause = format!("{err:#}");
        match stage {
            Stage::Load if is_not_found(err) => JobError::NotFound { path },
            Stage::Load => JobError::LoadFailure { path, cause },
            Stage::Execute => JobError::ExecutionFailure { path, cause },
            Stage::Save => JobError::SaveFailure { path, cause },
        }
    }

    pub fn status(&self) -> JobStatus {
        match self {
            JobError::NotFound { .. } => JobStatus::NotFound,
            JobError::LoadFailure { .. } => JobStatus::LoadFailure,
            JobError::ExecutionFailure { .. } => JobStatus::ExecutionFailure,
            JobError::SaveFailure { .. } => JobStatus::SaveFailure,
        }
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<std::io::Error>()
            .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
    })
}

/// A successfully executed notebook, kept in memory for the caller.
#[derive(Debug, Clone)]
pub struct ExecutedNotebook {
    pub notebook: Notebook,
    pub saved_to: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct JobReport {
    pub job: Job,
    pub result: Result<ExecutedNotebook, JobError>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl JobReport {
    pub fn status(&self) -> JobStatus {
        match &self.result {
            Ok(_) => JobStatus::Succeeded,
            Err(err) => err.status(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn notebook(&self) -> Option<&Notebook> {
        self.result.as_ref().ok().map(|executed| &executed.notebook)
    }

    pub fn error(&self) -> Option<&JobError> {
        self.result.as_ref().err()
    }

    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            input: self.job.input.clone(),
            output: self.job.output.clone(),
            status: self.status(),
            error_msg: self.error().map(ToString::to_string),
            cell_count: self.notebook().map(Notebook::cell_count),
            started_at: self.started_at.to_rfc3339(),
            duration_ms: self.duration.as_millis() as u64,
        }
    }
}

/// Ordered results of one runner invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub track_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.jobs.iter().filter(|job| job.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.jobs.len() - self.succeeded()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn to_record(&self) -> RunRecord {
        RunRecord {
            track_id: self.track_id.clone(),
            started_at: self.started_at.to_rfc3339(),
            finished_at: self.finished_at.to_rfc3339(),
            total: self.jobs.len(),
            succeeded: self.succeeded(),
            failed: self.failed(),
            jobs: self.jobs.iter().map(JobReport::to_record).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub status: JobStatus,
    pub error_msg: Option<String>,
    pub cell_count: Option<usize>,
    pub started_at: String,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub track_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub jobs: Vec<JobRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn working_dir_falls_back_to_current_dir() {
        assert_eq!(Job::new("nb.ipynb", None).working_dir(), PathBuf::from("."));
        assert_eq!(
            Job::new("./get_files.ipynb", None).working_dir(),
            PathBuf::from(".")
        );
        assert_eq!(
            Job::new("data/etl/load.ipynb", Some("out.ipynb")).working_dir(),
            PathBuf::from("data/etl")
        );
    }

    #[test]
    fn save_stage_targets_the_output_path() {
        let job = Job::new("nb/in.ipynb", Some("out/run.ipynb"));
        assert_eq!(job.stage_path(Stage::Load), Path::new("nb/in.ipynb"));
        assert_eq!(job.stage_path(Stage::Execute), Path::new("nb/in.ipynb"));
        assert_eq!(job.stage_path(Stage::Save), Path::new("out/run.ipynb"));

        let err = anyhow::anyhow!("File exists");
        let classified = JobError::from_stage(Stage::Save, job.stage_path(Stage::Save), &err);
        assert_eq!(
            classified,
            JobError::SaveFailure {
                path: PathBuf::from("out/run.ipynb"),
                cause: "File exists".to_string(),
            }
        );
    }

    #[test]
    fn missing_file_classified_as_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Err::<(), _>(io)
            .context("failed to read file missing.ipynb")
            .unwrap_err();

        let classified = JobError::from_stage(Stage::Load, Path::new("missing.ipynb"), &err);
        assert_eq!(classified.status(), JobStatus::NotFound);
        assert_eq!(classified.to_string(), "notebook not found at missing.ipynb");

        let executed = JobError::from_stage(Stage::Execute, Path::new("missing.ipynb"), &err);
        assert_eq!(executed.status(), JobStatus::ExecutionFailure);
    }

    #[test]
    fn other_load_errors_keep_their_cause_chain() {
        let err = anyhow::anyhow!("expected value at line 1").context("notebook is not valid JSON");
        let classified = JobError::from_stage(Stage::Load, Path::new("bad.ipynb"), &err);

        match classified {
            JobError::LoadFailure { cause, .. } => {
                assert_eq!(cause, "notebook is not valid JSON: expected value at line 1");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
