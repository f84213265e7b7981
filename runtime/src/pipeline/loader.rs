use std::{path::Path, sync::Arc};

use anyhow::{Result, anyhow};
use async_trait::async_trait;

use super::file_repository::FileRepository;
use crate::notebook::Notebook;

#[async_trait]
pub trait NotebookLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Notebook>;
}

#[derive(Clone)]
pub struct JsonNotebookLoader {
    file_repo: Arc<dyn FileRepository>,
}

impl JsonNotebookLoader {
    pub fn new(file_repo: Arc<dyn FileRepository>) -> Self {
        Self { file_repo }
    }
}

#[async_trait]
impl NotebookLoader for JsonNotebookLoader {
    async fn load(&self, path: &Path) -> Result<Notebook> {
        let bytes = self.file_repo.read(path).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(anyhow!("file content is empty"));
        }

        Notebook::from_slice(&bytes)
    }
}
