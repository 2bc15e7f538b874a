//! Access-token sources for the admin API.
//!
//! Credentials are taken from the runtime, never provisioned: either a
//! token handed in through `SQLSTOP_ACCESS_TOKEN`, or the service-account
//! token served by the GCE / Cloud Run metadata server.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use sqlstop_core::{AdminError, AdminResult};
use tokio::sync::Mutex;
use tracing::debug;

/// Environment variable holding a pre-issued bearer token.
pub const ACCESS_TOKEN_ENV: &str = "SQLSTOP_ACCESS_TOKEN";

/// Environment variable overriding the metadata server host.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";

const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
const TOKEN_PATH: &str = "/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before the server-reported expiry.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Boxed future alias for token lookups.
pub type TokenFuture<'a> = Pin<Box<dyn Future<Output = AdminResult<String>> + Send + 'a>>;

/// Supplies bearer tokens for admin API requests.
pub trait TokenSource: Send + Sync {
    fn token(&self) -> TokenFuture<'_>;
}

/// A fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> TokenFuture<'_> {
        let token = self.0.clone();
        Box::pin(async move { Ok(token) })
    }
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

#[derive(Debug)]
struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Default service-account token from the metadata server, cached until
/// shortly before it expires.
pub struct MetadataToken {
    http: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataToken {
    /// Use `GCE_METADATA_HOST` if set, otherwise `metadata.google.internal`.
    pub fn new(http: reqwest::Client) -> Self {
        let host = std::env::var(METADATA_HOST_ENV)
            .ok()
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_METADATA_HOST.to_string());
        Self::with_host(http, &host)
    }

    /// Metadata server at `host` (`host` or `host:port`, plain HTTP).
    pub fn with_host(http: reqwest::Client, host: &str) -> Self {
        Self {
            http,
            url: format!("http://{host}{TOKEN_PATH}"),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> AdminResult<MetadataTokenResponse> {
        let resp = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| AdminError::Auth(format!("metadata server unreachable: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(AdminError::Auth(format!(
                "metadata server returned {status}: {}",
                text.trim()
            )));
        }

        resp.json::<MetadataTokenResponse>()
            .await
            .map_err(|e| AdminError::Auth(format!("invalid metadata token response: {e}")))
    }
}

impl TokenSource for MetadataToken {
    fn token(&self) -> TokenFuture<'_> {
        Box::pin(async move {
            let mut cached = self.cached.lock().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() < token.refresh_at {
                    return Ok(token.value.clone());
                }
            }

            let fresh = self.fetch().await?;
            let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(EXPIRY_MARGIN);
            debug!(expires_in = fresh.expires_in, "fetched metadata access token");

            let value = fresh.access_token;
            *cached = Some(CachedToken {
                value: value.clone(),
                refresh_at: Instant::now() + lifetime,
            });
            Ok(value)
        })
    }
}

/// Pick a token source from the environment.
pub fn token_source_from_env(http: reqwest::Client) -> Arc<dyn TokenSource> {
    match std::env::var(ACCESS_TOKEN_ENV) {
        Ok(token) if !token.trim().is_empty() => {
            debug!("using access token from {ACCESS_TOKEN_ENV}");
            Arc::new(StaticToken::new(token.trim()))
        }
        _ => {
            debug!("using metadata server access token");
            Arc::new(MetadataToken::new(http))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_is_returned_as_is() {
        let source = StaticToken::new("abc");
        assert_eq!(source.token().await.unwrap(), "abc");
    }

    #[test]
    fn metadata_url_uses_host() {
        let source = MetadataToken::with_host(reqwest::Client::new(), "127.0.0.1:8999");
        assert_eq!(
            source.url,
            "http://127.0.0.1:8999/computeMetadata/v1/instance/service-accounts/default/token"
        );
    }

    #[test]
    fn metadata_response_parses() {
        let resp: MetadataTokenResponse = serde_json::from_str(
            r#"{"access_token":"ya29.x","expires_in":3599,"token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(resp.access_token, "ya29.x");
        assert_eq!(resp.expires_in, 3599);
    }
}
