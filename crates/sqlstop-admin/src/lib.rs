//! sqlstop-admin — Cloud SQL Admin API client.
//!
//! [`HttpSqlAdmin`] implements the [`sqlstop_core::SqlAdmin`] seam over
//! reqwest. Bearer tokens come from a [`TokenSource`]: a static token
//! from the environment, or the metadata server's service-account token.

pub mod client;
pub mod token;

pub use client::HttpSqlAdmin;
pub use token::{token_source_from_env, MetadataToken, StaticToken, TokenSource};
