//! Reading the current like count from the video platform.

use core::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tracing::debug;

/// Public YouTube Data API v3 base URL.
pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// A single observation of the like count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountSnapshot {
    pub count: u64,
    pub observed_at: DateTime<Utc>,
}

impl CountSnapshot {
    #[must_use]
    pub fn now(count: u64) -> Self {
        Self {
            count,
            observed_at: Utc::now(),
        }
    }
}

/// Why a fetch failed. None of these end a session; the loop waits and tries again.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum FetchError {
    #[error("API key rejected: {0}")]
    Auth(String),
    #[error("video '{resource_id}' {reason}")]
    NotFound {
        resource_id: String,
        reason: &'static str,
    },
    #[error("temporary failure: {0}")]
    Transient(String),
}

/// Source of like counts.
pub trait CountFetcher: Send + Sync + 'static {
    /// Reads the current count of `resource_id`.
    fn fetch(
        &self,
        credential: &SecretString,
        resource_id: &str,
    ) -> impl Future<Output = Result<CountSnapshot, FetchError>> + Send;
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    #[serde(default)]
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    /// The API encodes counts as decimal strings; absent when the owner hides likes.
    #[serde(default)]
    like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: String,
}

/// Fetches `videos.list?part=statistics` from the YouTube Data API.
#[derive(Debug, Clone)]
pub struct YouTubeFetcher {
    client: reqwest::Client,
    api_base: String,
}

impl YouTubeFetcher {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_base: &str, request_timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("likesync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl CountFetcher for YouTubeFetcher {
    async fn fetch(
        &self,
        credential: &SecretString,
        resource_id: &str,
    ) -> Result<CountSnapshot, FetchError> {
        let url = format!("{}/videos", self.api_base);
        // without_url: the request URL carries the API key
        let response = self
            .client
            .get(&url)
            .query(&[
                ("part", "statistics"),
                ("id", resource_id),
                ("key", credential.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.json::<ApiErrorResponse>().await.ok();
            return Err(classify_error_status(status, body, resource_id));
        }

        let list = response
            .json::<VideoListResponse>()
            .await
            .map_err(|e| {
                FetchError::Transient(format!("unexpected response body: {}", e.without_url()))
            })?;
        debug!(resource_id, items = list.items.len(), "Fetched video statistics");

        let count = like_count_from(list, resource_id)?;
        Ok(CountSnapshot::now(count))
    }
}

fn like_count_from(list: VideoListResponse, resource_id: &str) -> Result<u64, FetchError> {
    let Some(item) = list.items.into_iter().next() else {
        return Err(FetchError::NotFound {
            resource_id: resource_id.to_string(),
            reason: "returned no results",
        });
    };
    let Some(raw) = item.statistics.and_then(|s| s.like_count) else {
        return Err(FetchError::NotFound {
            resource_id: resource_id.to_string(),
            reason: "does not expose a like count",
        });
    };
    raw.parse()
        .map_err(|_| FetchError::Transient(format!("malformed likeCount '{raw}'")))
}

fn classify_error_status(
    status: StatusCode,
    body: Option<ApiErrorResponse>,
    resource_id: &str,
) -> FetchError {
    let (message, reasons) = body.map_or_else(
        || (status.to_string(), Vec::new()),
        |b| {
            (
                b.error.message,
                b.error.errors.into_iter().map(|e| e.reason).collect(),
            )
        },
    );
    let has_reason = |wanted: &[&str]| reasons.iter().any(|r| wanted.contains(&r.as_str()));

    if has_reason(&["quotaExceeded", "rateLimitExceeded", "userRateLimitExceeded"]) {
        return FetchError::Transient(message);
    }
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::Auth(message),
        StatusCode::BAD_REQUEST if has_reason(&["keyInvalid", "keyExpired"]) => {
            FetchError::Auth(message)
        }
        StatusCode::NOT_FOUND => FetchError::NotFound {
            resource_id: resource_id.to_string(),
            reason: "does not exist",
        },
        _ => FetchError::Transient(format!("{status}: {message}")),
    }
}
