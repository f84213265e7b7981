use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use super::types::{Job, JobError, RunReport, Stage};
use crate::storage::ReportStorage;

/// Logs job failures and publishes the summary of each run.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    storage: Option<Arc<dyn ReportStorage>>,
}

impl ErrorReporter {
    pub fn new(storage: Option<Arc<dyn ReportStorage>>) -> Self {
        Self { storage }
    }

    /// Log a failed stage with its cause chain and classify it for the job result.
    pub fn record(&self, job: &Job, stage: Stage, err: &anyhow::Error) -> JobError {
        let path = job.stage_path(stage);
        let classified = JobError::from_stage(stage, path, err);

        match (&classified, stage) {
            (JobError::NotFound { path }, _) => {
                error!(input = %path.display(), "notebook not found");
            }
            (_, Stage::Save) => {
                error!(
                    input = %job.input.display(),
                    output = %path.display(),
                    stage = stage.as_str(),
                    error = %err,
                    "job failed"
                );
            }
            _ => {
                error!(
                    input = %job.input.display(),
                    stage = stage.as_str(),
                    error = %err,
                    "job failed"
                );
            }
        }

        if !matches!(classified, JobError::NotFound { .. }) {
            for (depth, cause) in err.chain().skip(1).enumerate() {
                error!(
                    input = %job.input.display(),
                    cause_depth = depth + 1,
                    cause = %cause,
                    "caused by"
                );
            }
        }

        classified
    }

    pub async fn publish(&self, report: &RunReport) -> Result<()> {
        info!(
            track_id = %report.track_id,
            total = report.jobs.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "run finished"
        );
        for job in report.jobs.iter().filter(|job| !job.is_success()) {
            warn!(
                track_id = %report.track_id,
                input = %job.job.input.display(),
                status = ?job.status(),
                "job did not complete"
            );
        }

        if let Some(storage) = &self.storage {
            storage.save(&report.to_record()).await?;
        }
        Ok(())
    }
}
