use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::storage::write_file_atomic;

#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()>;
}

#[derive(Debug, Default, Clone)]
pub struct FsFileRepository;

#[async_trait]
impl FileRepository for FsFileRepository {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read file {}", path.display()))
    }

    async fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        write_file_atomic(path, bytes)
            .await
            .with_context(|| format!("failed to write file {}", path.display()))
    }
}
