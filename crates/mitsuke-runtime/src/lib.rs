//! UI-agnostic application facade.
//!
//! [`Runtime`] owns the session store, the list cache and the network
//! clients, and exposes one method per user action. Front ends hold no
//! logic of their own.

mod browse;
mod enrich;
mod error;
pub mod feedback;
mod list;

use std::sync::Arc;

use tracing::info;

use mitsuke_api::backend::{AuthError, BackendClient};
use mitsuke_api::jikan::JikanClient;
use mitsuke_api::traits::{Backend, CatalogService, Profile, ProfilePatch, RegistrationFields};
use mitsuke_core::config::AppConfig;
use mitsuke_core::fetch::FetchOrchestrator;
use mitsuke_core::list_cache::ListCacheHandle;
use mitsuke_core::messages::MessageBoard;
use mitsuke_core::models::{MalId, Session, UserId, UserRecord};
use mitsuke_core::session::SessionStore;
use mitsuke_core::storage::SqliteSessionStorage;

pub use browse::AnimeDetails;
pub use enrich::Enricher;
pub use error::RuntimeError;
pub use list::MutationOutcome;

pub struct Runtime<C, B> {
    session: Arc<SessionStore>,
    cache: ListCacheHandle,
    catalog: Arc<C>,
    backend: Arc<B>,
    fetcher: FetchOrchestrator,
    enricher: Enricher<C>,
    /// Held while the list is fetched from the backend.
    list_load: tokio::sync::Mutex<()>,
    config: AppConfig,
}

impl Runtime<JikanClient, BackendClient> {
    /// Wire the real clients and restore the durable session.
    ///
    /// Must be called inside a tokio runtime.
    pub fn open(config: AppConfig) -> Result<Self, RuntimeError> {
        let db_path = config.ensure_session_db_path()?;
        let storage = SqliteSessionStorage::open(&db_path)?;
        let session = Arc::new(SessionStore::hydrate(storage));

        let catalog = JikanClient::new(config.catalog.base_url.clone());
        let backend = BackendClient::new(config.backend.base_url.clone(), session.clone());
        Ok(Self::with_parts(config, session, catalog, backend))
    }
}

impl<C, B> Runtime<C, B>
where
    C: CatalogService + 'static,
    B: Backend + 'static,
{
    /// Assemble a runtime from already-built parts.
    ///
    /// Spawns the list cache actor, so it must run inside a tokio runtime.
    pub fn with_parts(config: AppConfig, session: Arc<SessionStore>, catalog: C, backend: B) -> Self {
        let fetcher = FetchOrchestrator::from_config(&config.fetch);
        let cache = ListCacheHandle::spawn(session.subscribe(), config.cache.evict_on_logout);
        let catalog = Arc::new(catalog);
        let enricher = Enricher::new(Arc::clone(&catalog), fetcher);
        Self {
            session,
            cache,
            catalog,
            backend: Arc::new(backend),
            fetcher,
            enricher,
            list_load: tokio::sync::Mutex::new(()),
            config,
        }
    }

    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    pub fn cache(&self) -> &ListCacheHandle {
        &self.cache
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// A fresh feedback board keyed by catalog id, one per view.
    pub fn message_board(&self) -> MessageBoard<MalId> {
        MessageBoard::new(self.config.messages.display_duration())
    }

    pub fn current_user(&self) -> Option<UserRecord> {
        self.session.current().user().cloned()
    }

    fn require_user(&self) -> Result<UserId, RuntimeError> {
        self.session
            .current()
            .user_id()
            .ok_or(RuntimeError::NotLoggedIn)
    }

    // ── Account ─────────────────────────────────────────────────

    /// Exchange credentials for a session.
    ///
    /// An unverified account surfaces as [`AuthError::Unverified`].
    pub async fn login(&self, username: &str, password: &str) -> Result<UserRecord, RuntimeError> {
        let response = self.backend.login(username, password).await?;
        self.session.login(response.token, response.user.clone())?;
        Ok(response.user)
    }

    /// End the session. Memory is cleared even if durable storage fails.
    pub fn logout(&self) -> Result<(), RuntimeError> {
        self.session.logout()?;
        Ok(())
    }

    pub async fn register(&self, fields: &RegistrationFields) -> Result<UserRecord, RuntimeError> {
        if fields.username.trim().is_empty() || fields.email.trim().is_empty() {
            return Err(RuntimeError::Validation(
                "Username and email are required.".into(),
            ));
        }
        if fields.password.is_empty() {
            return Err(RuntimeError::Validation("Password is required.".into()));
        }
        let user = self.backend.register(fields).await?;
        info!(user_id = %user.user_id, "Account registered");
        Ok(user)
    }

    pub async fn verify_account(&self, token: &str) -> Result<String, RuntimeError> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidToken.into());
        }
        Ok(self.backend.verify_account(token).await?)
    }

    pub async fn resend_verification(&self, user_id: UserId) -> Result<(), RuntimeError> {
        Ok(self.backend.resend_verification(user_id).await?)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<String, RuntimeError> {
        if email.trim().is_empty() {
            return Err(RuntimeError::Validation("Email is required.".into()));
        }
        Ok(self.backend.request_password_reset(email).await?)
    }

    /// Set a new password from a reset link.
    pub async fn reset_password(
        &self,
        token: Option<&str>,
        new_password: &str,
        confirm: &str,
    ) -> Result<String, RuntimeError> {
        let token = token
            .filter(|t| !t.trim().is_empty())
            .ok_or(AuthError::InvalidToken)?;
        if new_password != confirm {
            return Err(RuntimeError::Validation("Passwords do not match.".into()));
        }
        if new_password.is_empty() {
            return Err(RuntimeError::Validation("Password is required.".into()));
        }
        Ok(self.backend.reset_password(token, new_password).await?)
    }

    pub async fn profile(&self) -> Result<Profile, RuntimeError> {
        self.require_user()?;
        Ok(self.backend.current_profile().await?)
    }

    /// Patch the signed-in user's profile and refresh the session's copy.
    ///
    /// An empty password is not sent.
    pub async fn update_profile(&self, mut patch: ProfilePatch) -> Result<UserRecord, RuntimeError> {
        let Session::LoggedIn(identity) = self.session.current() else {
            return Err(RuntimeError::NotLoggedIn);
        };
        if patch.password.as_deref().is_some_and(str::is_empty) {
            patch.password = None;
        }
        let updated = self
            .backend
            .update_profile(identity.user.user_id, &patch)
            .await?;
        self.session.login(identity.credential, updated.clone())?;
        info!(user_id = %updated.user_id, "Profile updated");
        Ok(updated)
    }
}
