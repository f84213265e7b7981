use anyhow::Result;
use async_trait::async_trait;

pub mod io;
pub mod json_report;

pub use io::*;
pub use json_report::JsonReportStorage;

use crate::pipeline::RunRecord;

pub type StorageResult<T> = Result<T>;

/// Destination for the summary of a finished run.
#[async_trait]
pub trait ReportStorage: Send + Sync {
    async fn save(&self, record: &RunRecord) -> StorageResult<()>;
    async fn load(&self) -> StorageResult<Option<RunRecord>>;
}
