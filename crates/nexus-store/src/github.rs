// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`DocumentStore`] backed by the GitHub contents API.
//!
//! Every save is a commit: the API takes a commit message and the blob sha
//! the caller last read, and rejects the write when that sha is stale,
//! which is exactly the compare-and-swap the store contract needs.

use crate::{DocumentStore, StoredDocument, VersionTag};
use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use nexus_error::{NexusCode, NexusError, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::warn;

const DEFAULT_BASE_URL: &str = "https://api.github.com";
const ACCEPT_HEADER: &str = "application/vnd.github+json";
const USER_AGENT: &str = concat!("dev-nexus/", env!("CARGO_PKG_VERSION"));

/// One file in one GitHub repository, read and written as commits.
pub struct GitHubStore {
    client: reqwest::Client,
    base_url: String,
    repo: String,
    path: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Deserialize)]
struct PutContent {
    sha: String,
}

impl GitHubStore {
    /// Build a store for `repo` ("owner/name") and `path` within it.
    pub fn new(
        repo: impl Into<String>,
        path: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                NexusError::new(NexusCode::Internal, "failed to build HTTP client").with_source(e)
            })?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            repo: repo.into(),
            path: path.into(),
            token,
        })
    }

    /// Point the store at a different API host (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.base_url, self.repo, self.path
        )
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(reqwest::header::ACCEPT, ACCEPT_HEADER);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl DocumentStore for GitHubStore {
    async fn load(&self) -> Result<Option<StoredDocument>> {
        let response = self
            .request(self.client.get(self.contents_url()))
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body: ContentsResponse = response.json().await.map_err(|e| {
                    NexusError::new(
                        NexusCode::RemoteUnavailable,
                        "contents response was not the expected JSON",
                    )
                    .with_source(e)
                })?;
                let content = decode_content(&body.content)?;
                Ok(Some(StoredDocument {
                    content,
                    version: VersionTag(body.sha),
                }))
            }
            status => Err(status_error("load", status)),
        }
    }

    async fn save(
        &self,
        content: &str,
        message: &str,
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag> {
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
        });
        if let Some(tag) = expected {
            body["sha"] = json!(tag.0.clone());
        }

        let response = self
            .request(self.client.put(self.contents_url()))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        match response.status() {
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => {
                warn!(repo = %self.repo, path = %self.path, "stale sha on save");
                Err(NexusError::new(
                    NexusCode::RemoteConflict,
                    "remote repository rejected the write: version tag is stale",
                )
                .with_context("expected", expected.map(|v| v.0.clone())))
            }
            status if status.is_success() => {
                let body: PutResponse = response.json().await.map_err(|e| {
                    NexusError::new(
                        NexusCode::RemoteUnavailable,
                        "commit response was not the expected JSON",
                    )
                    .with_source(e)
                })?;
                Ok(VersionTag(body.content.sha))
            }
            status => Err(status_error("save", status)),
        }
    }
}

/// The API wraps base64 lines at 60 columns; strip whitespace first.
fn decode_content(raw: &str) -> Result<String> {
    let compact: String = raw.split_whitespace().collect();
    let bytes = BASE64.decode(compact).map_err(|e| {
        NexusError::new(
            NexusCode::RemoteUnavailable,
            "contents payload is not valid base64",
        )
        .with_source(e)
    })?;
    String::from_utf8(bytes).map_err(|e| {
        NexusError::new(
            NexusCode::RemoteUnavailable,
            "contents payload is not valid UTF-8",
        )
        .with_source(e)
    })
}

fn transport_error(e: reqwest::Error) -> NexusError {
    NexusError::new(
        NexusCode::RemoteUnavailable,
        "remote repository is unreachable",
    )
    .with_source(e)
}

fn status_error(operation: &str, status: StatusCode) -> NexusError {
    NexusError::new(
        NexusCode::RemoteUnavailable,
        format!("remote repository {operation} failed with status {status}"),
    )
    .with_context("status", status.as_u16())
}
