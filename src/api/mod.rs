pub mod types;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::state::ClientConfig;
use types::{
    AnswerMetrics, FeedbackRequest, FeedbackStats, QueryRequest, QueryResponse, QueryTopics,
    ResponseTimeStats, SearchHit, SearchResponse, UsageStats,
};

/// Failure talking to the question-answering backend.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connect failure, timeout, or a body that could not be read.
    #[error("request failed: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("{status} {status_text}")]
    Status { status: u16, status_text: String },

    /// The body was not the JSON shape we expected.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Everything the chat front-end needs from the backend.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /query`
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError>;

    /// `POST /feedback`; the response body is ignored.
    async fn feedback(&self, request: &FeedbackRequest) -> Result<(), ApiError>;

    /// `GET /render-markdown/{path}` for an already-normalized relative path.
    async fn render_markdown(&self, relative_path: &str) -> Result<String, ApiError>;

    async fn feedback_stats(&self) -> Result<FeedbackStats, ApiError>;
    async fn response_time_stats(&self) -> Result<ResponseTimeStats, ApiError>;
    async fn query_topics(&self) -> Result<QueryTopics, ApiError>;
    async fn usage_stats(&self) -> Result<UsageStats, ApiError>;
    async fn answer_metrics(&self) -> Result<AnswerMetrics, ApiError>;

    /// `GET /api/search?q=`
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ApiError>;
}

/// reqwest-backed implementation of [`Backend`].
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &ClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        debug!(%url, "GET");
        let resp = check_status(self.client.get(&url).send().await?)?;
        Ok(resp.json::<T>().await?)
    }
}

/// Map a non-2xx response to [`ApiError::Status`], keeping the status verbatim.
fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    // hyper only records the reason phrase when it differs from the canonical one.
    let status_text = match resp.extensions().get::<hyper::ext::ReasonPhrase>() {
        Some(reason) => String::from_utf8_lossy(reason.as_bytes()).into_owned(),
        None => status.canonical_reason().unwrap_or_default().to_string(),
    };
    Err(ApiError::Status {
        status: status.as_u16(),
        status_text,
    })
}

/// Build the render-markdown path segment for a normalized document path.
pub fn render_markdown_path(relative_path: &str) -> String {
    format!("/render-markdown/{}", urlencoding::encode(relative_path))
}

#[async_trait]
impl Backend for HttpBackend {
    async fn query(&self, request: &QueryRequest) -> Result<QueryResponse, ApiError> {
        let resp = self
            .client
            .post(self.endpoint("/query"))
            .json(request)
            .send()
            .await?;
        let resp = check_status(resp)?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }

    async fn feedback(&self, request: &FeedbackRequest) -> Result<(), ApiError> {
        let resp = self
            .client
            .post(self.endpoint("/feedback"))
            .json(request)
            .send()
            .await?;
        check_status(resp)?;
        Ok(())
    }

    async fn render_markdown(&self, relative_path: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&render_markdown_path(relative_path));
        let resp = check_status(self.client.get(&url).send().await?)?;
        Ok(resp.text().await?)
    }

    async fn feedback_stats(&self) -> Result<FeedbackStats, ApiError> {
        self.get_json("/api/dashboard/feedback").await
    }

    async fn response_time_stats(&self) -> Result<ResponseTimeStats, ApiError> {
        self.get_json("/api/dashboard/response_time").await
    }

    async fn query_topics(&self) -> Result<QueryTopics, ApiError> {
        self.get_json("/api/dashboard/query_topics").await
    }

    async fn usage_stats(&self) -> Result<UsageStats, ApiError> {
        self.get_json("/api/dashboard/usage").await
    }

    async fn answer_metrics(&self) -> Result<AnswerMetrics, ApiError> {
        self.get_json("/api/dashboard/answer_metrics").await
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ApiError> {
        let path = format!("/api/search?q={}", urlencoding::encode(query));
        let resp: SearchResponse = self.get_json(&path).await?;
        Ok(resp.results)
    }
}
