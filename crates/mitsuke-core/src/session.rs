//! The session store: single source of truth for who is logged in.
//!
//! Every transition is persisted through a [`SessionStorage`] and then
//! published on a `watch` channel, which the list cache follows to pick
//! the active slot.

use mitsuke_api::traits::CredentialProvider;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::MitsukeError;
use crate::models::{Identity, Session, UserRecord};
use crate::storage::SessionStorage;

pub struct SessionStore {
    storage: Box<dyn SessionStorage>,
    tx: watch::Sender<Session>,
}

impl SessionStore {
    /// Build the store, restoring whatever session the storage holds.
    ///
    /// Unreadable storage starts the store logged out.
    pub fn hydrate(storage: impl SessionStorage + 'static) -> Self {
        let initial = match storage.load() {
            Ok(Some(identity)) => {
                info!(user_id = %identity.user.user_id, "Restored session");
                Session::LoggedIn(identity)
            }
            Ok(None) => Session::LoggedOut,
            Err(e) => {
                warn!("Failed to read stored session: {e}");
                Session::LoggedOut
            }
        };
        let (tx, _) = watch::channel(initial);
        Self {
            storage: Box::new(storage),
            tx,
        }
    }

    /// Snapshot of the current session.
    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    /// Set credential and user together.
    ///
    /// The pair is persisted first; on a storage error nothing changes.
    pub fn login(&self, credential: String, user: UserRecord) -> Result<(), MitsukeError> {
        let identity = Identity { credential, user };
        self.storage.store(&identity)?;
        info!(user_id = %identity.user.user_id, username = %identity.user.username, "Session started");
        self.tx.send_replace(Session::LoggedIn(identity));
        Ok(())
    }

    /// Clear credential and user together.
    ///
    /// The in-memory session is always cleared; a storage failure is
    /// reported after the fact.
    pub fn logout(&self) -> Result<(), MitsukeError> {
        let previous = self.tx.send_replace(Session::LoggedOut);
        if let Some(user_id) = previous.user_id() {
            info!(%user_id, "Session ended");
        }
        self.storage.clear()
    }

    /// Receiver that observes every later transition.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }
}

impl CredentialProvider for SessionStore {
    fn credential(&self) -> Option<String> {
        self.tx.borrow().credential().map(str::to_string)
    }
}
