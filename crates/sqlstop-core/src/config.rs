//! Runtime configuration.
//!
//! Values are resolved in order: explicit overrides (CLI flags), then the
//! environment, then an optional `sqlstop.toml`, then defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::stopper::TolerancePolicy;

/// Default Cloud SQL Admin API endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://sqladmin.googleapis.com";

/// Environment variables consulted for the project id, in order.
pub const PROJECT_ENV_VARS: [&str; 2] = ["GCP_PROJECT", "GOOGLE_CLOUD_PROJECT"];

/// Contents of a `sqlstop.toml` file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub project: Option<String>,
    pub endpoint: Option<String>,
    pub tolerate: Option<TolerancePolicy>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Values supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub project: Option<String>,
    pub endpoint: Option<String>,
    pub tolerate: Option<TolerancePolicy>,
}

/// Fully resolved configuration for one process.
#[derive(Debug, Clone, PartialEq)]
pub struct StopperConfig {
    pub project: String,
    pub endpoint: String,
    pub tolerate: TolerancePolicy,
}

impl StopperConfig {
    /// Resolve configuration from the process environment.
    pub fn load(overrides: Overrides, file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = file.map(FileConfig::from_file).transpose()?.unwrap_or_default();
        Self::resolve(overrides, file, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve(
        overrides: Overrides,
        file: FileConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let non_blank = |p: &String| !p.trim().is_empty();
        let from_env = PROJECT_ENV_VARS
            .iter()
            .filter_map(|&key| env(key))
            .find(non_blank);

        // Blank values at any layer fall through to the next one.
        let project = overrides
            .project
            .filter(non_blank)
            .or(from_env)
            .or(file.project.filter(non_blank))
            .ok_or(ConfigError::MissingProject)?;

        Ok(Self {
            project,
            endpoint: overrides
                .endpoint
                .or(file.endpoint)
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            tolerate: overrides.tolerate.or(file.tolerate).unwrap_or_default(),
        })
    }
}
