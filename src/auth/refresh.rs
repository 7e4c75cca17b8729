// Token refresh logic

use anyhow::{anyhow, Context, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use reqwest::{Client, Url};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::session::Session;
use super::types::{RefreshRequest, RefreshResponse};
use crate::error::ApiError;
use crate::request::endpoint_url;

/// Refresh endpoint path, relative to the backend base URL
pub const REFRESH_PATH: &str = "/api/token/refresh/";

/// Why an exchange produced no usable token
#[derive(Debug, Clone)]
enum ExchangeError {
    /// The backend refused the refresh token and the credentials were evicted
    Rejected(String),
    /// The outcome could not be written to the credential store
    Storage(String),
}

impl From<ExchangeError> for ApiError {
    fn from(err: ExchangeError) -> Self {
        match err {
            ExchangeError::Rejected(message) => ApiError::TerminalAuthError(message),
            ExchangeError::Storage(message) => ApiError::Internal(anyhow!(message)),
        }
    }
}

/// Outcome of one refresh exchange, shared by every waiter
type SharedRefresh = Shared<BoxFuture<'static, std::result::Result<String, ExchangeError>>>;

/// Exchanges the refresh token for a new access token
///
/// At most one exchange runs at a time. Callers that hit a 401 while an
/// exchange is in flight await that exchange instead of starting their own.
pub struct TokenRefresher {
    client: Client,
    refresh_url: Url,
    in_flight: Arc<Mutex<Option<SharedRefresh>>>,
}

impl TokenRefresher {
    pub fn new(client: Client, base_url: &Url) -> Result<Self> {
        let refresh_url =
            endpoint_url(base_url, REFRESH_PATH).context("Failed to build refresh URL")?;

        Ok(Self {
            client,
            refresh_url,
            in_flight: Arc::new(Mutex::new(None)),
        })
    }

    /// Get a replacement for the access token `rejected` that drew a 401
    ///
    /// If the backend refuses the refresh token the session has already been
    /// evicted and the error is `TerminalAuthError`. A store that cannot
    /// record the outcome yields `Internal`.
    pub async fn refresh(
        &self,
        session: &Arc<Session>,
        rejected: Option<&str>,
    ) -> std::result::Result<String, ApiError> {
        let exchange = {
            let mut slot = self.in_flight.lock().await;

            // A concurrent refresh already replaced the rejected token
            if let Some(current) = session.access_token()? {
                if rejected != Some(current.as_str()) {
                    tracing::debug!("Access token already refreshed, reusing it");
                    return Ok(current);
                }
            }

            match slot.as_ref() {
                Some(pending) => {
                    tracing::debug!("Joining in-flight token refresh");
                    pending.clone()
                }
                None => {
                    let Some(refresh_token) = session.refresh_token()? else {
                        return Err(ApiError::TerminalAuthError(
                            "credentials were evicted by a concurrent refresh".to_string(),
                        ));
                    };

                    let exchange = run_exchange(
                        self.client.clone(),
                        self.refresh_url.clone(),
                        refresh_token,
                        Arc::clone(session),
                        Arc::clone(&self.in_flight),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(exchange.clone());
                    exchange
                }
            }
        };

        exchange.await.map_err(ApiError::from)
    }
}

/// Run one exchange, apply its outcome to the session and free the slot
///
/// The slot is released by the exchange itself, so it is freed even when
/// every caller that awaited it has been dropped.
async fn run_exchange(
    client: Client,
    url: Url,
    refresh_token: String,
    session: Arc<Session>,
    in_flight: Arc<Mutex<Option<SharedRefresh>>>,
) -> std::result::Result<String, ExchangeError> {
    let result = request_access_token(&client, &url, &refresh_token).await;

    // Session update and slot release happen under the lock, so the next
    // caller sees either this exchange or its applied outcome
    let mut slot = in_flight.lock().await;
    let outcome = match result {
        Ok(access_token) => match session.set_access_token(&access_token) {
            Ok(()) => Ok(access_token),
            Err(e) => {
                tracing::error!("Failed to persist refreshed access token: {:#}", e);
                Err(ExchangeError::Storage(format!(
                    "failed to persist refreshed access token: {:#}",
                    e
                )))
            }
        },
        Err(e) => {
            tracing::error!("Token refresh failed: {:#}", e);
            match session.expire() {
                Ok(()) => Err(ExchangeError::Rejected(format!("{:#}", e))),
                Err(clear_err) => {
                    tracing::error!("Failed to evict credentials: {:#}", clear_err);
                    Err(ExchangeError::Storage(format!(
                        "token refresh failed ({:#}) and credentials could not be evicted: {:#}",
                        e, clear_err
                    )))
                }
            }
        }
    };
    *slot = None;

    outcome
}

/// POST the refresh token and return the new access token
pub async fn request_access_token(client: &Client, url: &Url, refresh_token: &str) -> Result<String> {
    tracing::info!("Refreshing access token...");

    let response = client
        .post(url.clone())
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await
        .context("Failed to send token refresh request")?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!(
            "Token refresh rejected: {} - {}",
            status,
            crate::error::truncate_body(&error_text)
        );
    }

    let data: RefreshResponse = response
        .json()
        .await
        .context("Failed to parse token refresh response")?;

    if data.access.is_empty() {
        anyhow::bail!("Token refresh response does not contain access");
    }

    tracing::info!("Access token refreshed");
    Ok(data.access)
}
