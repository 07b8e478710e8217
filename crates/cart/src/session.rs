//! Cart sessions and the provider handed to the view layer.
//!
//! A [`CartSession`] owns one [`CartStore`] for the lifetime of a buyer's
//! session: `begin` restores local state and kicks off the initial remote
//! sync, `end` tears it down. The [`CartProvider`] is the injection point;
//! asking it for a cart when no session is active is a programmer error and
//! fails with [`CartError::NotProvisioned`].

use secrecy::SecretString;
use tokio::task::JoinHandle;
use tracing::{error, info};

use bulkcart_core::{CurrencyCode, SessionId};

use crate::api::CartApi;
use crate::config::token_fingerprint;
use crate::error::{CartError, Result};
use crate::storage::KeyValueStore;
use crate::store::{CartStore, SyncOutcome};

/// One buyer session and its cart.
pub struct CartSession<A, S> {
    id: SessionId,
    store: CartStore<A, S>,
    initial_sync: Option<JoinHandle<SyncOutcome>>,
}

impl<A: CartApi, S: KeyValueStore> CartSession<A, S> {
    /// Start a session.
    ///
    /// Restores the cart synchronously. When `token` is present the initial
    /// remote sync is spawned, so this must run inside a tokio runtime.
    pub fn begin(
        api: A,
        storage: S,
        token: Option<SecretString>,
        currency: CurrencyCode,
    ) -> Self {
        let id = SessionId::generate();
        let credential = token.as_ref().map(token_fingerprint);
        let store = CartStore::new(api, storage, token, currency);
        let initial_sync = store.spawn_sync();

        info!(
            session_id = %id,
            credential = credential.as_deref().unwrap_or("none"),
            "Cart session started"
        );

        Self {
            id,
            store,
            initial_sync,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub const fn store(&self) -> &CartStore<A, S> {
        &self.store
    }

    /// Wait for the initial sync spawned by `begin`.
    ///
    /// Returns `None` if no sync was spawned, it was already awaited, or the
    /// task panicked.
    pub async fn wait_for_initial_sync(&mut self) -> Option<SyncOutcome> {
        let handle = self.initial_sync.take()?;
        match handle.await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!(session_id = %self.id, error = %e, "Initial cart sync task failed");
                None
            }
        }
    }

    /// End the session. An initial sync still in flight is left to finish.
    pub fn end(self) {
        info!(
            session_id = %self.id,
            items = self.store.item_count(),
            "Cart session ended"
        );
    }
}

/// Provides the active session's cart to consumers.
pub struct CartProvider<A, S> {
    session: Option<CartSession<A, S>>,
}

impl<A, S> Default for CartProvider<A, S> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<A: CartApi, S: KeyValueStore> CartProvider<A, S> {
    /// Create a provider with no active session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `session`, ending any previous one.
    pub fn provide(&mut self, session: CartSession<A, S>) {
        if let Some(previous) = self.session.replace(session) {
            previous.end();
        }
    }

    /// The active session's cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotProvisioned` when no session is active.
    pub fn cart(&self) -> Result<&CartStore<A, S>> {
        self.session
            .as_ref()
            .map(CartSession::store)
            .ok_or(CartError::NotProvisioned)
    }

    /// The active session.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotProvisioned` when no session is active.
    pub fn session_mut(&mut self) -> Result<&mut CartSession<A, S>> {
        self.session.as_mut().ok_or(CartError::NotProvisioned)
    }

    #[must_use]
    pub const fn is_provisioned(&self) -> bool {
        self.session.is_some()
    }

    /// End the active session, if any.
    pub fn end_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.end();
        }
    }
}
