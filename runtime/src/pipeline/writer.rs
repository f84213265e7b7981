use std::{path::Path, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;

use super::file_repository::FileRepository;
use crate::notebook::Notebook;

#[async_trait]
pub trait NotebookWriter: Send + Sync {
    /// Persist `notebook` at `path`, replacing any existing file.
    async fn write(&self, notebook: &Notebook, path: &Path) -> Result<()>;
}

#[derive(Clone)]
pub struct JsonNotebookWriter {
    file_repo: Arc<dyn FileRepository>,
}

impl JsonNotebookWriter {
    pub fn new(file_repo: Arc<dyn FileRepository>) -> Self {
        Self { file_repo }
    }
}

#[async_trait]
impl NotebookWriter for JsonNotebookWriter {
    async fn write(&self, notebook: &Notebook, path: &Path) -> Result<()> {
        let bytes = notebook.to_vec()?;
        self.file_repo.write(path, &bytes).await
    }
}
