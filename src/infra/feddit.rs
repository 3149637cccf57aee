//! HTTP adapter for the Feddit comment API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::application::upstream::{CommentSource, UpstreamError, UpstreamPage};
use crate::config::UpstreamSettings;
use crate::domain::comments::Comment;

use super::error::InfraError;

const SUBFEDDITS_PATH: &str = "api/v1/subfeddits/";
const COMMENTS_PATH: &str = "api/v1/comments/";
const SUBFEDDIT_DIRECTORY_LIMIT: u32 = 100;
const METRIC_UPSTREAM_REQUEST_MS: &str = "feddit_upstream_request_ms";

#[derive(Debug, Clone)]
pub struct FedditClientConfig {
    pub base_url: Url,
    pub timeout: Duration,
    pub max_connections: usize,
    pub keepalive_connections: usize,
}

impl From<&UpstreamSettings> for FedditClientConfig {
    fn from(settings: &UpstreamSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            timeout: settings.timeout,
            max_connections: settings.max_connections.get() as usize,
            keepalive_connections: settings.keepalive_connections as usize,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubfedditDirectory {
    #[serde(default)]
    subfeddits: Vec<SubfedditSummary>,
}

#[derive(Debug, Deserialize)]
struct SubfedditSummary {
    id: i64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct CommentsPayload {
    subfeddit_id: Option<i64>,
    comments: Vec<Comment>,
}

/// [`CommentSource`] backed by the Feddit HTTP API.
///
/// Collections are addressed by subfeddit title; each fetch resolves the
/// title through the subfeddit directory, then reads the comment page.
/// Concurrent requests are bounded by a semaphore. The configured timeout
/// bounds a whole fetch: both requests and every wait for a slot.
#[derive(Clone)]
pub struct FedditClient {
    client: Client,
    base: Url,
    timeout: Duration,
    slots: Arc<Semaphore>,
}

impl FedditClient {
    pub fn new(config: FedditClientConfig) -> Result<Self, InfraError> {
        let base = with_trailing_slash(config.base_url);
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(config.timeout)
            .pool_max_idle_per_host(config.keepalive_connections)
            .build()
            .map_err(|err| InfraError::upstream_client(err.to_string()))?;

        Ok(Self {
            client,
            base,
            timeout: config.timeout,
            slots: Arc::new(Semaphore::new(config.max_connections.max(1))),
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("feddit/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Look up the subfeddit id for `name`, ignoring case.
    pub async fn resolve(&self, name: &str) -> Result<i64, UpstreamError> {
        let url = self.url(
            SUBFEDDITS_PATH,
            &[("limit", SUBFEDDIT_DIRECTORY_LIMIT.to_string())],
        )?;
        let directory: SubfedditDirectory = self
            .get_json(url)
            .await?
            .ok_or_else(|| UpstreamError::malformed("subfeddit directory returned 404"))?;

        let wanted = name.trim().to_lowercase();
        directory
            .subfeddits
            .into_iter()
            .find(|subfeddit| subfeddit.title.to_lowercase() == wanted)
            .map(|subfeddit| subfeddit.id)
            .ok_or_else(|| UpstreamError::not_found(name))
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<Url, UpstreamError> {
        let mut url = self
            .base
            .join(path)
            .map_err(|err| UpstreamError::unavailable(format!("invalid upstream url: {err}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET `url` and decode the body. A 404 is reported as `Ok(None)`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, UpstreamError> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| UpstreamError::unavailable("upstream client is shutting down"))?;

        let started = Instant::now();
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| transport_error(&url, &err))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|err| transport_error(&url, &err))?;
        histogram!(METRIC_UPSTREAM_REQUEST_MS).record(started.elapsed().as_secs_f64() * 1000.0);

        debug!(url = %url, status = status.as_u16(), bytes = bytes.len(), "upstream response");

        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(UpstreamError::unavailable(format!(
                "upstream answered {status} for {}",
                url.path()
            )));
        }
        if !status.is_success() {
            return Err(UpstreamError::malformed(format!(
                "upstream rejected {} with {status}",
                url.path()
            )));
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|err| UpstreamError::malformed(format!("{}: {err}", url.path())))
    }

    async fn fetch_page(
        &self,
        collection: &str,
        limit: u32,
        skip: u32,
    ) -> Result<UpstreamPage, UpstreamError> {
        let subfeddit_id = self.resolve(collection).await?;
        let url = self.url(
            COMMENTS_PATH,
            &[
                ("subfeddit_id", subfeddit_id.to_string()),
                ("limit", limit.to_string()),
                ("skip", skip.to_string()),
            ],
        )?;

        let payload: CommentsPayload = self
            .get_json(url)
            .await?
            .ok_or_else(|| UpstreamError::not_found(collection))?;

        Ok(UpstreamPage {
            subfeddit_id: payload.subfeddit_id.unwrap_or(subfeddit_id),
            comments: payload.comments,
        })
    }
}

#[async_trait]
impl CommentSource for FedditClient {
    async fn fetch(
        &self,
        collection: &str,
        limit: u32,
        skip: u32,
    ) -> Result<UpstreamPage, UpstreamError> {
        tokio::time::timeout(self.timeout, self.fetch_page(collection, limit, skip))
            .await
            .map_err(|_| {
                warn!(
                    collection,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "upstream fetch exceeded its timeout"
                );
                UpstreamError::unavailable(format!(
                    "no upstream answer within {}ms",
                    self.timeout.as_millis()
                ))
            })?
    }
}

fn transport_error(url: &Url, err: &reqwest::Error) -> UpstreamError {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else {
        "transport"
    };
    warn!(url = %url, kind, error = %err, "upstream request failed");
    UpstreamError::unavailable(format!("{kind} error calling {}: {err}", url.path()))
}

fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
