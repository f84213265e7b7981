use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use notebook_runner::{
    config::{config_path, load_config},
    pipeline::PipelineRunner,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "Runner crashed");
            eprintln!("Runner crashed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    init_tracing();
    if let Err(err) = dotenvy::dotenv() {
        if !err.not_found() {
            return Err(err).context("Problem loading .env file");
        }
    }

    let config = load_config(&config_path())
        .await
        .context("Failed to load runner configuration")?;
    info!(
        jobs = config.jobs.len(),
        timeout_secs = config.executor.timeout_secs,
        kernel = %config.executor.kernel_name,
        "Loaded configuration"
    );

    let runner = PipelineRunner::new(&config);
    let report = runner.run(&config.jobs).await;

    if config.fail_on_error && report.has_failures() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
