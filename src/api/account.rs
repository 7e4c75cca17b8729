// Login, registration and profile

use super::{BlogApi, LOGIN_PATH, PROFILE_PATH, REGISTER_PATH};
use crate::auth::CredentialSet;
use crate::error::{ApiError, Result};
use crate::models::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::request::PendingRequest;

impl BlogApi {
    /// Log in and establish the credential set
    pub async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        tracing::info!(username = %username, "Logging in");
        let request = PendingRequest::post(LOGIN_PATH).json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?;

        let auth: AuthResponse = self.call(request).await?;
        self.establish(&auth)?;
        Ok(auth)
    }

    /// Register a new account and establish the credential set
    pub async fn register(&self, registration: &RegisterRequest) -> Result<AuthResponse> {
        tracing::info!(username = %registration.username, "Registering account");
        let request = PendingRequest::post(REGISTER_PATH).json(registration)?;

        let auth: AuthResponse = self.call(request).await?;
        self.establish(&auth)?;
        Ok(auth)
    }

    /// Fetch the authenticated user's profile
    pub async fn profile(&self) -> Result<User> {
        self.call(PendingRequest::get(PROFILE_PATH)).await
    }

    /// Drop the local credential set
    pub fn logout(&self) -> Result<()> {
        self.session().clear()?;
        Ok(())
    }

    fn establish(&self, auth: &AuthResponse) -> Result<()> {
        if auth.access.is_empty() || auth.refresh.is_empty() {
            return Err(ApiError::InvalidResponse(
                "auth response is missing tokens".to_string(),
            ));
        }

        self.session().establish(&CredentialSet {
            access_token: auth.access.clone(),
            refresh_token: auth.refresh.clone(),
            user: auth.user.to_string(),
        })?;
        Ok(())
    }
}
