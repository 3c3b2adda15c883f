//! The `http-object` resource: a GET against an object URL.
//!
//! Entries are keyed by the normalised URL, so `HTTPS://Host/a` and
//! `https://host/a` share one fetch.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

use catalog_core::Resource;

pub const RESOURCE_NAME: &str = "http-object";

/// What a successful fetch records about an object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub bytes: u64,
}

/// Fetch failure, cached verbatim as the entry's `Err` state.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    #[error("timed out after {seconds}s fetching {url}")]
    Timeout { url: String, seconds: u64 },

    #[error("could not connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl FetchError {
    fn from_reqwest(url: &Url, timeout: Duration, err: &reqwest::Error) -> Self {
        let url = url.to_string();
        if err.is_timeout() {
            Self::Timeout {
                url,
                seconds: timeout.as_secs(),
            }
        } else if err.is_connect() {
            Self::Connect {
                url,
                message: err.to_string(),
            }
        } else {
            Self::Request {
                url,
                message: err.to_string(),
            }
        }
    }
}

/// Build an HTTP client with the configured timeout and user agent.
pub fn build_client(timeout: Duration, user_agent: &str) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
}

/// Register the `http-object` resource over `client`.
pub fn object_resource(client: reqwest::Client, timeout: Duration) -> Resource<Url, ObjectInfo, FetchError> {
    Resource::builder(RESOURCE_NAME, move |url: Url| {
        let client = client.clone();
        async move { fetch_object(&client, &url, timeout).await }
    })
    .key(|url: &Url| url.as_str().to_owned())
    .build()
}

async fn fetch_object(client: &reqwest::Client, url: &Url, timeout: Duration) -> Result<ObjectInfo, FetchError> {
    debug!(url = %url, "GET");
    let response = client
        .get(url.clone())
        .send()
        .await
        .map_err(|e| FetchError::from_reqwest(url, timeout, &e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response
        .bytes()
        .await
        .map_err(|e| FetchError::from_reqwest(url, timeout, &e))?;

    Ok(ObjectInfo {
        url: url.to_string(),
        status: status.as_u16(),
        content_type,
        bytes: u64::try_from(body.len()).unwrap_or(u64::MAX),
    })
}
