//! HTTP client for the academy backend's attendance endpoints.

use async_trait::async_trait;
use chrono::NaiveDate;
use dojo_core::EntityKind;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::info;

use crate::transport::AttendanceTransport;
use crate::wire::MarkRequest;
use crate::SyncError;

/// HTTP sync client for `/attendance/*`.
pub struct SyncClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl SyncClient {
    /// Create a new client for the given API base URL.
    ///
    /// `base_url` should be like `http://localhost:8000/api` (a trailing slash
    /// is trimmed).
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Bearer token sent with every request. Without one, every call fails
    /// with [`SyncError::AuthRequired`] before touching the network.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, SyncError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(SyncError::AuthRequired),
        }
    }

    async fn get_json(&self, url: &str) -> Result<Value, SyncError> {
        let request = self.authorized(self.client.get(url))?;
        read_json(request.send().await?).await
    }
}

#[async_trait]
impl AttendanceTransport for SyncClient {
    async fn fetch_roster(&self, kind: EntityKind, date: NaiveDate) -> Result<Value, SyncError> {
        let url = format!(
            "{}/attendance/{}?date={}",
            self.base_url,
            kind.plural(),
            date.format("%Y-%m-%d")
        );
        info!(url = %url, "fetching attendance roster");
        self.get_json(&url).await
    }

    async fn mark(&self, request: &MarkRequest) -> Result<Value, SyncError> {
        let url = format!("{}/attendance/mark", self.base_url);
        info!(url = %url, user_id = %request.user_id, status = %request.status, "posting attendance mark");
        let builder = self.authorized(self.client.post(&url).json(request))?;
        read_json(builder.send().await?).await
    }

    async fn fetch_stats(&self, date: NaiveDate) -> Result<Option<Value>, SyncError> {
        let url = format!("{}/attendance/stats?date={}", self.base_url, date.format("%Y-%m-%d"));
        match self.get_json(&url).await {
            Ok(body) => Ok(Some(body)),
            Err(SyncError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map the status line onto [`SyncError`] and parse the body as JSON.
/// An empty success body reads as `null`.
async fn read_json(resp: Response) -> Result<Value, SyncError> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(status_error(status, body));
    }
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&body)?)
}

fn status_error(status: StatusCode, body: String) -> SyncError {
    match status {
        StatusCode::UNAUTHORIZED => SyncError::AuthRequired,
        StatusCode::FORBIDDEN => SyncError::PermissionDenied(body),
        StatusCode::NOT_FOUND => SyncError::NotFound(body),
        _ => SyncError::Server {
            status: status.as_u16(),
            body,
        },
    }
}
