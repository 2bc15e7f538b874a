//! HTTP implementation of [`SqlAdmin`] for the Cloud SQL Admin v1beta4 API.
//!
//! ```text
//! GET   {endpoint}/sql/v1beta4/projects/{project}/instances[?pageToken=..]
//! PATCH {endpoint}/sql/v1beta4/projects/{project}/instances/{instance}
//! ```
//!
//! Pages of the list call are merged into a single [`InstanceList`].
//! Non-2xx responses are decoded from the Google error envelope into
//! [`AdminError::Api`].

use std::collections::HashSet;
use std::sync::Arc;

use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use sqlstop_core::{
    AdminError, AdminFuture, AdminResult, InstanceList, Operation, PatchRequest, SqlAdmin,
};

use crate::token::{token_source_from_env, TokenSource};

const API_PREFIX: [&str; 2] = ["sql", "v1beta4"];

/// Cloud SQL Admin client over HTTPS.
#[derive(Clone)]
pub struct HttpSqlAdmin {
    http: Client,
    base: Url,
    tokens: Arc<dyn TokenSource>,
}

impl HttpSqlAdmin {
    /// Build a client with a default reqwest [`Client`].
    pub fn new(endpoint: &str, tokens: Arc<dyn TokenSource>) -> AdminResult<Self> {
        Self::with_client(default_client()?, endpoint, tokens)
    }

    /// Build a client whose credentials come from the runtime environment.
    ///
    /// See [`token_source_from_env`].
    pub fn from_env(endpoint: &str) -> AdminResult<Self> {
        let http = default_client()?;
        let tokens = token_source_from_env(http.clone());
        Self::with_client(http, endpoint, tokens)
    }

    /// Build a client around an existing reqwest [`Client`].
    pub fn with_client(
        http: Client,
        endpoint: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> AdminResult<Self> {
        let base = Url::parse(endpoint)
            .map_err(|e| AdminError::Transport(format!("invalid endpoint {endpoint:?}: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(AdminError::Transport(format!(
                "invalid endpoint {endpoint:?}: not a base URL"
            )));
        }
        Ok(Self { http, base, tokens })
    }

    fn instances_url(&self, project: &str, instance: Option<&str>) -> AdminResult<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| AdminError::Transport("endpoint is not a base URL".to_string()))?;
            segments
                .pop_if_empty()
                .extend(API_PREFIX)
                .extend(["projects", project, "instances"]);
            if let Some(instance) = instance {
                segments.push(instance);
            }
        }
        Ok(url)
    }

    async fn list_page(&self, project: &str, page_token: Option<&str>) -> AdminResult<InstanceList> {
        let mut url = self.instances_url(project, None)?;
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        let token = self.tokens.token().await?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }

    async fn list_all(&self, project: &str) -> AdminResult<InstanceList> {
        let mut list = self.list_page(project, None).await?;
        let mut seen = HashSet::new();
        let mut pages = 1usize;

        while let Some(token) = list.next_page_token.take().filter(|t| !t.is_empty()) {
            // A token handed out twice means the listing cycles.
            if !seen.insert(token.clone()) {
                return Err(AdminError::Decode(format!(
                    "list pagination returned page token {token:?} twice"
                )));
            }
            let page = self.list_page(project, Some(&token)).await?;
            list.merge(page);
            pages += 1;
        }

        debug!(
            %project,
            pages,
            instances = list.items.as_ref().map_or(0, Vec::len),
            "listed instances"
        );
        Ok(list)
    }

    async fn patch(
        &self,
        project: &str,
        instance: &str,
        body: &PatchRequest,
    ) -> AdminResult<Operation> {
        let url = self.instances_url(project, Some(instance))?;
        let token = self.tokens.token().await?;

        let resp = self
            .http
            .patch(url)
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(resp).await
    }
}

impl SqlAdmin for HttpSqlAdmin {
    fn list_instances<'a>(&'a self, project: &'a str) -> AdminFuture<'a, InstanceList> {
        Box::pin(self.list_all(project))
    }

    fn patch_instance<'a>(
        &'a self,
        project: &'a str,
        instance: &'a str,
        body: &'a PatchRequest,
    ) -> AdminFuture<'a, Operation> {
        Box::pin(self.patch(project, instance, body))
    }
}

fn default_client() -> AdminResult<Client> {
    Client::builder()
        .user_agent(concat!("sqlstop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(transport)
}

fn transport(e: reqwest::Error) -> AdminError {
    AdminError::Transport(e.to_string())
}

async fn decode<T: DeserializeOwned>(resp: Response) -> AdminResult<T> {
    let status = resp.status();
    let text = resp.text().await.map_err(transport)?;

    if !status.is_success() {
        return Err(api_error(status.as_u16(), &text));
    }
    serde_json::from_str(&text).map_err(|e| AdminError::Decode(e.to_string()))
}

// ── Error envelope ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    #[serde(default)]
    reason: Option<String>,
}

/// Map a non-2xx body to [`AdminError::Api`], keeping raw text when the
/// body is not a Google error envelope.
pub(crate) fn api_error(status: u16, body: &str) -> AdminError {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(ErrorEnvelope { error }) => AdminError::Api {
            status,
            reason: error
                .errors
                .into_iter()
                .find_map(|item| item.reason)
                .or(error.status),
            message: error.message.unwrap_or_else(|| body.trim().to_string()),
        },
        Err(_) => AdminError::Api {
            status,
            reason: None,
            message: body.trim().to_string(),
        },
    }
}
