// Collaborator-facing API
// Thin typed calls through the authentication pipeline to fixed backend paths

mod account;
mod posts;

use reqwest::Response;
use serde::de::DeserializeOwned;
use std::sync::Arc;

use crate::auth::Session;
use crate::error::{ApiError, Result};
use crate::http_client::BlogHttpClient;
use crate::request::PendingRequest;

pub const LOGIN_PATH: &str = "/api/auth/login/";
pub const REGISTER_PATH: &str = "/api/auth/register/";
pub const PROFILE_PATH: &str = "/api/auth/profile/";
pub const POSTS_PATH: &str = "/api/posts/";
pub const PUBLIC_POSTS_PATH: &str = "/api/public/posts/";

fn post_path(id: i64) -> String {
    format!("{}{}/", POSTS_PATH, id)
}

fn comments_path(post_id: i64) -> String {
    format!("{}{}/comments/", POSTS_PATH, post_id)
}

/// Travel Blog API client
#[derive(Clone)]
pub struct BlogApi {
    http: Arc<BlogHttpClient>,
}

impl BlogApi {
    pub fn new(http: Arc<BlogHttpClient>) -> Self {
        Self { http }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.http.session()
    }

    /// Send through the pipeline and decode a successful JSON reply
    async fn call<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T> {
        let response = self.send_checked(request).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }

    /// Send through the pipeline, turning non-success statuses into errors
    async fn send_checked(&self, request: PendingRequest) -> Result<Response> {
        let response = self.http.send(request).await?;
        check_response(response).await
    }
}

/// Check response status and return an error for non-success codes
async fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "Backend returned an error response");
    Err(ApiError::from_status(status, &body))
}
