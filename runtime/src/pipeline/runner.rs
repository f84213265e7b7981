use std::{sync::Arc, time::Duration};

use anyhow::Result;
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    storage::{JsonReportStorage, ReportStorage},
};

use super::{
    error_reporter::ErrorReporter,
    executor::{ExecutionRequest, NotebookExecutor},
    file_repository::{FileRepository, FsFileRepository},
    loader::{JsonNotebookLoader, NotebookLoader},
    nbconvert::NbconvertExecutor,
    types::{ExecutedNotebook, Job, JobError, JobReport, RunReport, Stage},
    writer::{JsonNotebookWriter, NotebookWriter},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerSettings {
    pub timeout: Duration,
    pub kernel_name: String,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            kernel_name: "python3".to_string(),
        }
    }
}

/// Loads, executes and saves notebooks one job at a time.
///
/// Failures never escape `run`: each job ends up as one entry of the returned report.
pub struct PipelineRunner {
    loader: Arc<dyn NotebookLoader>,
    executor: Arc<dyn NotebookExecutor>,
    writer: Arc<dyn NotebookWriter>,
    reporter: ErrorReporter,
    settings: RunnerSettings,
}

impl PipelineRunner {
    pub fn new(config: &AppConfig) -> Self {
        let file_repo: Arc<dyn FileRepository> = Arc::new(FsFileRepository);
        let storage = config
            .report_path
            .as_ref()
            .map(|path| Arc::new(JsonReportStorage::new(path)) as Arc<dyn ReportStorage>);

        Self::with_dependencies(
            RunnerSettings {
                timeout: config.executor.timeout(),
                kernel_name: config.executor.kernel_name.clone(),
            },
            Arc::new(JsonNotebookLoader::new(file_repo.clone())),
            Arc::new(NbconvertExecutor::from_config(&config.executor)),
            Arc::new(JsonNotebookWriter::new(file_repo)),
            ErrorReporter::new(storage),
        )
    }

    /// Filesystem loader and writer around a caller-supplied executor.
    pub fn with_executor(settings: RunnerSettings, executor: Arc<dyn NotebookExecutor>) -> Self {
        let file_repo: Arc<dyn FileRepository> = Arc::new(FsFileRepository);
        Self::with_dependencies(
            settings,
            Arc::new(JsonNotebookLoader::new(file_repo.clone())),
            executor,
            Arc::new(JsonNotebookWriter::new(file_repo)),
            ErrorReporter::default(),
        )
    }

    pub fn with_dependencies(
        settings: RunnerSettings,
        loader: Arc<dyn NotebookLoader>,
        executor: Arc<dyn NotebookExecutor>,
        writer: Arc<dyn NotebookWriter>,
        reporter: ErrorReporter,
    ) -> Self {
        Self {
            loader,
            executor,
            writer,
            reporter,
            settings,
        }
    }

    pub fn with_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn run(&self, jobs: &[Job]) -> RunReport {
        let track_id = generate_track_id("run");
        let started_at = chrono::Utc::now();
        info!(track_id = %track_id, jobs = jobs.len(), "starting notebook run");

        let mut reports = Vec::with_capacity(jobs.len());
        for job in jobs {
            let job_started_at = chrono::Utc::now();
            let clock = Instant::now();
            let result = self.process_job(job).await;
            reports.push(JobReport {
                job: job.clone(),
                result,
                started_at: job_started_at,
                duration: clock.elapsed(),
            });
        }

        let report = RunReport {
            track_id,
            started_at,
            finished_at: chrono::Utc::now(),
            jobs: reports,
        };

        if let Err(err) = self.reporter.publish(&report).await {
            warn!(error = %err, track_id = %report.track_id, "failed to persist run report");
        }
        report
    }

    async fn process_job(&self, job: &Job) -> Result<ExecutedNotebook, JobError> {
        info!(input = %job.input.display(), "loading notebook");
        let mut notebook = self
            .loader
            .load(&job.input)
            .await
            .map_err(|err| self.reporter.record(job, Stage::Load, &err))?;
        info!(
            input = %job.input.display(),
            cells = notebook.cell_count(),
            "notebook loaded"
        );

        let request = ExecutionRequest {
            timeout: self.settings.timeout,
            kernel_name: self.settings.kernel_name.clone(),
            working_dir: job.working_dir(),
        };
        info!(
            input = %job.input.display(),
            working_dir = %request.working_dir.display(),
            "executing notebook"
        );
        self.executor
            .execute(&mut notebook, &request)
            .await
            .map_err(|err| self.reporter.record(job, Stage::Execute, &anyhow::Error::new(err)))?;
        info!(input = %job.input.display(), "notebook execution complete");

        let Some(output) = job.output.as_ref() else {
            return Ok(ExecutedNotebook {
                notebook,
                saved_to: None,
            });
        };

        self.writer
            .write(&notebook, output)
            .await
            .map_err(|err| self.reporter.record(job, Stage::Save, &err))?;
        info!(output = %output.display(), "executed notebook saved");

        Ok(ExecutedNotebook {
            notebook,
            saved_to: Some(output.clone()),
        })
    }
}

fn generate_track_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4())
}
