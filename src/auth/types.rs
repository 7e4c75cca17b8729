// Authentication types

use serde::{Deserialize, Serialize};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Storage key for the serialized user record
pub const USER_KEY: &str = "user";

/// Every key that makes up the credential set
pub const CREDENTIAL_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Complete credential set
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialSet {
    pub access_token: String,
    pub refresh_token: String,
    /// Serialized user record, cached for display only
    pub user: String,
}

/// Credential-set transitions, broadcast to whoever owns navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Access token replaced after a successful refresh
    Refreshed,
    /// Refresh failed and the credential set was evicted
    Expired,
    /// Credential set cleared by an explicit logout
    LoggedOut,
}

/// Token refresh request body
#[derive(Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Token refresh response body
#[derive(Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub access: String,
}
