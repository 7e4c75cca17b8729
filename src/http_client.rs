use anyhow::{Context, Result};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Request, Response, StatusCode, Url};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Session, TokenRefresher};
use crate::error::{self, ApiError};
use crate::request::{build_form, endpoint_url, PendingRequest, RequestBody};

/// HTTP client for the Travel Blog API
///
/// Attaches the session's access token to every request and, on a 401,
/// refreshes it once and replays the request.
pub struct BlogHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// Backend base URL
    base_url: Url,

    /// Credential set
    session: Arc<Session>,

    /// Refresh exchange, shared by concurrent requests
    refresher: TokenRefresher,
}

impl BlogHttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str, request_timeout: u64, session: Arc<Session>) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {}", base_url))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        let refresher = TokenRefresher::new(client.clone(), &base_url)?;

        Ok(Self {
            client,
            base_url,
            session,
            refresher,
        })
    }

    /// Send a request through the authentication pipeline
    ///
    /// Non-401 responses are returned unchanged, whatever their status.
    pub async fn send(&self, mut request: PendingRequest) -> Result<Response, ApiError> {
        let mut token = self.session.access_token()?;

        loop {
            let response = self.dispatch(&request, token.as_deref()).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if request.is_retried() {
                tracing::warn!(path = %request.path, "Replayed request rejected again");
                return Err(Self::unauthorized(response).await);
            }

            if self.session.refresh_token()?.is_none() {
                tracing::debug!(path = %request.path, "Received 401 with no refresh token");
                return Err(Self::unauthorized(response).await);
            }

            tracing::warn!(path = %request.path, "Received 401, refreshing token and retrying...");
            request.mark_retried();
            token = Some(self.refresher.refresh(&self.session, token.as_deref()).await?);
        }
    }

    /// Execute one attempt
    async fn dispatch(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<Response, ApiError> {
        let req = self.build_request(request, token)?;
        let method = req.method().clone();
        let url = req.url().clone();

        tracing::debug!(
            method = %method,
            url = %url,
            retried = request.is_retried(),
            "Sending HTTP request"
        );

        match self.client.execute(req).await {
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Received HTTP response");
                Ok(response)
            }
            Err(e) => {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connection_failed"
                } else if e.is_request() {
                    "request_error"
                } else {
                    "unknown"
                };

                tracing::error!(
                    error_kind = error_kind,
                    error = %e,
                    method = %method,
                    url = %url,
                    "HTTP request failed"
                );
                Err(ApiError::Transport(e))
            }
        }
    }

    /// Build the wire request for one attempt
    pub fn build_request(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<Request, ApiError> {
        let url = self.url_for(&request.path)?;
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(request.headers.clone());

        builder = match &request.body {
            // The transport sets multipart/form-data with its boundary
            RequestBody::Multipart(fields) => builder.multipart(build_form(fields)?),
            RequestBody::Json(value) => builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(serde_json::to_vec(value).context("Failed to encode JSON body")?),
            RequestBody::Empty => {
                builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            }
        };

        if let Some(token) = token {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Access token is not a valid header value")?;
            value.set_sensitive(true);
            builder = builder.header(AUTHORIZATION, value);
        }

        Ok(builder.build()?)
    }

    fn url_for(&self, path: &str) -> Result<Url> {
        endpoint_url(&self.base_url, path)
    }

    async fn unauthorized(response: Response) -> ApiError {
        let body = response.text().await.unwrap_or_default();
        ApiError::AuthError(error::truncate_body(&body))
    }

    /// Credential set used by this client
    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Backend base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}
