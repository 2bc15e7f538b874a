//! sqlstop-core — stop running Cloud SQL instances in a project.
//!
//! Holds the typed API records, the [`SqlAdmin`] seam the stop pass talks
//! through, the [`InstanceStopper`] itself, and configuration resolution.
//! Transport lives in `sqlstop-admin`; entry points live in
//! `sqlstop-trigger` and `sqlstop-cli`.

pub mod admin;
pub mod config;
pub mod error;
pub mod stopper;
pub mod types;

pub use admin::{AdminFuture, SqlAdmin};
pub use config::{FileConfig, Overrides, StopperConfig};
pub use error::{AdminError, AdminResult, ConfigError, StopError};
pub use stopper::{
    InstanceOutcome, InstanceStopper, StopAction, StopSummary, TolerancePolicy, SUCCESS_MESSAGE,
};
pub use types::*;
