// Authentication module
// Owns the credential set and the token refresh exchange

mod refresh;
mod session;
mod store;
mod types;

pub use refresh::{request_access_token, TokenRefresher, REFRESH_PATH};
pub use session::Session;
pub use store::{CredentialStore, MemoryStore, SqliteStore};
pub use types::{
    CredentialSet, SessionEvent, ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, REFRESH_TOKEN_KEY, USER_KEY,
};
