use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::io::{read_json_file, write_json_file};
use super::{ReportStorage, StorageResult};
use crate::pipeline::RunRecord;

/// Keeps the latest run report as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonReportStorage {
    file_path: PathBuf,
}

impl JsonReportStorage {
    pub fn new<P>(file_path: P) -> Self
    where
        P: AsRef<Path>,
    {
        Self {
            file_path: file_path.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl ReportStorage for JsonReportStorage {
    async fn save(&self, record: &RunRecord) -> StorageResult<()> {
        write_json_file(&self.file_path, record).await
    }

    async fn load(&self) -> StorageResult<Option<RunRecord>> {
        read_json_file(&self.file_path).await
    }
}
