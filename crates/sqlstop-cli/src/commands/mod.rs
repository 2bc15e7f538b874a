pub mod run;
pub mod serve;

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::debug;

use sqlstop_admin::HttpSqlAdmin;
use sqlstop_core::{InstanceStopper, Overrides, StopperConfig, TolerancePolicy};

/// Options shared by every command that runs a stop pass.
#[derive(Args, Debug, Clone)]
pub struct StopOptions {
    /// Project id. Defaults to $GCP_PROJECT, then $GOOGLE_CLOUD_PROJECT,
    /// then `project` in the config file.
    #[arg(short, long)]
    pub project: Option<String>,
    /// Path to a sqlstop.toml config file.
    #[arg(short, long, env = "SQLSTOP_CONFIG")]
    pub config: Option<PathBuf>,
    /// Admin API endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,
    /// Which patch rejections are skipped instead of aborting the pass:
    /// replica-or-maintenance (400, 409) or any-client-error (4xx).
    #[arg(long)]
    pub tolerate: Option<TolerancePolicy>,
}

/// Resolve configuration and wire the HTTP admin client into a stopper.
pub fn build_stopper(opts: StopOptions) -> anyhow::Result<InstanceStopper<HttpSqlAdmin>> {
    let overrides = Overrides {
        project: opts.project,
        endpoint: opts.endpoint,
        tolerate: opts.tolerate,
    };
    let config = StopperConfig::load(overrides, opts.config.as_deref())?;
    debug!(
        project = %config.project,
        endpoint = %config.endpoint,
        tolerate = ?config.tolerate,
        "configuration resolved"
    );

    let admin = HttpSqlAdmin::from_env(&config.endpoint)
        .with_context(|| format!("failed to build admin client for {}", config.endpoint))?;
    Ok(InstanceStopper::new(admin, config.project).with_tolerance(config.tolerate))
}
