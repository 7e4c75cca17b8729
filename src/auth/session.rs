// Session state
// Explicit owner of the credential set; the pipeline reads and writes
// credentials only through this type.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;

use super::store::{CredentialStore, MemoryStore};
use super::types::{
    CredentialSet, SessionEvent, ACCESS_TOKEN_KEY, CREDENTIAL_KEYS, REFRESH_TOKEN_KEY, USER_KEY,
};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Session state backed by a credential store
pub struct Session {
    store: Box<dyn CredentialStore>,
    events: broadcast::Sender<SessionEvent>,
}

impl Session {
    pub fn new(store: impl CredentialStore + 'static) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store: Box::new(store),
            events,
        }
    }

    /// Session that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        self.store.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.store.get(REFRESH_TOKEN_KEY)
    }

    /// Raw serialized user record
    pub fn user_record(&self) -> Result<Option<String>> {
        self.store.get(USER_KEY)
    }

    /// Cached user record decoded into `T`
    pub fn user<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.user_record()?
            .map(|raw| serde_json::from_str(&raw).context("Failed to parse cached user record"))
            .transpose()
    }

    pub fn is_authenticated(&self) -> Result<bool> {
        Ok(self.access_token()?.is_some())
    }

    /// Store a complete credential set after login or registration
    pub fn establish(&self, credentials: &CredentialSet) -> Result<()> {
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, credentials.access_token.as_str()),
            (REFRESH_TOKEN_KEY, credentials.refresh_token.as_str()),
            (USER_KEY, credentials.user.as_str()),
        ])?;
        tracing::debug!("Credential set established");
        Ok(())
    }

    /// Replace the access token after a successful refresh
    pub fn set_access_token(&self, access_token: &str) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, access_token)?;
        self.notify(SessionEvent::Refreshed);
        Ok(())
    }

    /// Explicit logout
    pub fn clear(&self) -> Result<()> {
        self.store.remove_many(&CREDENTIAL_KEYS)?;
        tracing::info!("Credential set cleared");
        self.notify(SessionEvent::LoggedOut);
        Ok(())
    }

    /// Evict the credential set after an unrecoverable refresh failure
    pub fn expire(&self) -> Result<()> {
        self.store.remove_many(&CREDENTIAL_KEYS)?;
        tracing::warn!("Credential set evicted, login required");
        self.notify(SessionEvent::Expired);
        Ok(())
    }

    /// Subscribe to credential-set transitions
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}
