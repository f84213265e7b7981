use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::info;

use crate::pipeline::Job;

pub const DEFAULT_CONFIG_PATH: &str = "config/runner.yaml";
pub const CONFIG_PATH_ENV: &str = "RUNNER_CONFIG_PATH";

const DEFAULT_JOBS: &[(&str, &str)] = &[
    ("./get_files.ipynb", "./get_files_output.ipynb"),
    ("./insert_data.ipynb", "./insert_data_output.ipynb"),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_jobs")]
    pub jobs: Vec<Job>,
    #[serde(default)]
    pub executor: ExecutorConfig,
    /// Where to keep the JSON summary of the latest run, if anywhere.
    #[serde(default)]
    pub report_path: Option<PathBuf>,
    /// Exit non-zero when any job fails. Off by default.
    #[serde(default)]
    pub fail_on_error: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            jobs: default_jobs(),
            executor: ExecutorConfig::default(),
            report_path: None,
            fail_on_error: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub command: String,
    /// Placed before `nbconvert`, e.g. `["-m", "jupyter"]` with `command: python3`.
    pub args: Vec<String>,
    pub kernel_name: String,
    pub timeout_secs: u64,
    pub startup_grace_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: "jupyter".to_string(),
            args: Vec::new(),
            kernel_name: "python3".to_string(),
            timeout_secs: 600,
            startup_grace_secs: 60,
        }
    }
}

impl ExecutorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn startup_grace(&self) -> Duration {
        Duration::from_secs(self.startup_grace_secs)
    }
}

fn default_jobs() -> Vec<Job> {
    DEFAULT_JOBS
        .iter()
        .map(|(input, output)| Job::new(*input, Some(*output)))
        .collect()
}

impl AppConfig {
    pub fn from_yaml(contents: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(anyhow!("at least one job must be configured"));
        }
        if let Some(index) = self
            .jobs
            .iter()
            .position(|job| job.input.as_os_str().is_empty())
        {
            return Err(anyhow!("job {index} has an empty input path"));
        }
        if self.executor.timeout_secs == 0 {
            return Err(anyhow!("executor.timeout_secs must be greater than zero"));
        }
        if self.executor.command.trim().is_empty() {
            return Err(anyhow!("executor.command cannot be empty"));
        }
        if self.executor.kernel_name.trim().is_empty() {
            return Err(anyhow!("executor.kernel_name cannot be empty"));
        }
        Ok(())
    }
}

/// Read the config file, falling back to the built-in jobs when it does not exist.
pub async fn load_config(path: &Path) -> Result<AppConfig> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No config file found, using built-in jobs");
            return Ok(AppConfig::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read config file at {}", path.display()));
        }
    };

    let config = AppConfig::from_yaml(&contents)
        .with_context(|| format!("Failed to parse config file at {}", path.display()))?;
    info!(path = %path.display(), jobs = config.jobs.len(), "Configuration loaded from disk");
    Ok(config)
}

pub fn config_path() -> PathBuf {
    env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}
