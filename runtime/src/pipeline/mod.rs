pub mod error_reporter;
pub mod executor;
pub mod file_repository;
pub mod loader;
pub mod nbconvert;
pub mod runner;
pub mod types;
pub mod writer;

pub use error_reporter::ErrorReporter;
pub use executor::{ExecutionError, ExecutionRequest, NotebookExecutor};
pub use file_repository::{FileRepository, FsFileRepository};
pub use loader::{JsonNotebookLoader, NotebookLoader};
pub use nbconvert::NbconvertExecutor;
pub use runner::{PipelineRunner, RunnerSettings};
pub use types::{
    ExecutedNotebook, Job, JobError, JobRecord, JobReport, JobStatus, RunRecord, RunReport, Stage,
};
pub use writer::{JsonNotebookWriter, NotebookWriter};
