//! Hosted-backend collaborator contracts.
//! Persistence, authentication and profile storage belong to a backend
//! service; the application consumes these traits and never reaches around
//! them. `memory` is the in-process implementation used by the server and
//! the test suite; durability is explicitly out of scope.

mod memory;
mod session;

pub use memory::{MemoryBackend, NewAccount, NewStore, Profile, RatingView, StoreRecord};
pub use session::{AuthEvent, Session, SessionManager, SessionToken, Subscription};

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, AppResult, ProfileLookupError};

pub type UserId = Uuid;
pub type StoreId = Uuid;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Proof of authentication as far as this crate is concerned: presence plus
/// an identity reference. The token itself stays opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: UserId,
    pub token: SessionToken,
}

/// One client's ambient session, as issued by the auth backend. Every call
/// is a suspend point; callers must not assume ordering between two
/// independently issued calls.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Idempotent, side-effect free presence check.
    async fn get_current(&self) -> Option<SessionIdentity>;
    async fn sign_in(&self, credentials: &Credentials) -> AppResult<SessionIdentity>;
    /// Must invalidate the session such that a subsequent `get_current`
    /// returns absent.
    async fn sign_out(&self) -> AppResult<()>;
    /// Change events: sign-in, sign-out, token refresh, expiry.
    fn subscribe(&self) -> Subscription;
}

/// Key-value-like record store keyed by user identity. Returns the raw role
/// attribute; coercion into the closed [`crate::identity::Role`] set happens
/// in the resolver, at the trust boundary.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn role_of(&self, user_id: UserId) -> Result<String, ProfileLookupError>;
}

/// [`SessionProvider`] bound to at most one live token against the in-process
/// backend. The HTTP layer builds one per request from the session cookie;
/// long-lived embedders keep one for the life of the client.
pub struct ClientSession {
    auth: Arc<MemoryBackend>,
    sessions: Arc<SessionManager>,
    token: RwLock<Option<SessionToken>>,
}

impl ClientSession {
    pub fn new(auth: Arc<MemoryBackend>, sessions: Arc<SessionManager>) -> ClientSession {
        ClientSession::bound(auth, sessions, None)
    }

    pub fn bound(
        auth: Arc<MemoryBackend>,
        sessions: Arc<SessionManager>,
        token: Option<SessionToken>,
    ) -> ClientSession {
        ClientSession { auth, sessions, token: RwLock::new(token) }
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.token.read().clone()
    }
}

#[async_trait]
impl SessionProvider for ClientSession {
    async fn get_current(&self) -> Option<SessionIdentity> {
        let token = self.token.read().clone()?;
        let user_id = self.sessions.validate(&token)?;
        Some(SessionIdentity { user_id, token })
    }

    async fn sign_in(&self, credentials: &Credentials) -> AppResult<SessionIdentity> {
        let user_id = self.auth.authenticate(&credentials.email, &credentials.password)?;
        let session = self.sessions.issue(user_id);
        *self.token.write() = Some(session.token.clone());
        Ok(SessionIdentity { user_id, token: session.token })
    }

    async fn sign_out(&self) -> AppResult<()> {
        if let Some(token) = self.token.write().take() {
            self.sessions.revoke(&token);
        }
        Ok(())
    }

    fn subscribe(&self) -> Subscription {
        self.sessions.subscribe()
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn role_of(&self, user_id: UserId) -> Result<String, ProfileLookupError> {
        self.role_attr(user_id).ok_or(ProfileLookupError::NotFound)
    }
}

impl From<ProfileLookupError> for AppError {
    fn from(err: ProfileLookupError) -> Self {
        AppError::profile(err.to_string())
    }
}
