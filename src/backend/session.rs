use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use super::UserId;

pub type SessionToken = String;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

/// Session change notification. Expiry carries the same meaning as an
/// explicit sign-out for everyone downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    Expired,
}

fn gen_token() -> String {
    // 256-bit random token, base64url without padding. A failed entropy
    // source must never degrade to a predictable token.
    let mut buf = [0u8; 32];
    getrandom::getrandom(&mut buf).expect("system entropy source unavailable");
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-memory session issuer: random tokens, TTL expiry, revocation set and a
/// broadcast feed of change events. Mutations all notify subscribers; an
/// expired token is reported as absent the moment it is observed.
pub struct SessionManager {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
    revoked: RwLock<HashSet<SessionToken>>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for SessionManager {
    fn default() -> Self {
        SessionManager::new(Duration::from_secs(60 * 60))
    }
}

impl SessionManager {
    pub fn new(ttl: Duration) -> SessionManager {
        let (events, _) = broadcast::channel(64);
        SessionManager {
            ttl,
            sessions: RwLock::new(HashMap::new()),
            revoked: RwLock::new(HashSet::new()),
            events,
        }
    }

    pub fn issue(&self, user_id: UserId) -> Session {
        let now = Instant::now();
        let session = Session {
            token: gen_token(),
            user_id,
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(session.token.clone(), session.clone());
        debug!(user = %user_id, ttl_secs = self.ttl.as_secs(), "session issued");
        self.notify(AuthEvent::SignedIn);
        session
    }

    /// Resolve a token to its user, dropping it if expired or revoked.
    pub fn validate(&self, token: &str) -> Option<UserId> {
        if self.revoked.read().contains(token) {
            return None;
        }
        let now = Instant::now();
        let mut expired = false;
        let out = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(s) if s.expires_at > now => Some(s.user_id),
                Some(_) => {
                    expired = true;
                    None
                }
                None => None,
            }
        };
        if expired {
            self.sessions.write().remove(token);
            debug!("session expired");
            self.notify(AuthEvent::Expired);
        }
        out
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token).is_some();
        if removed {
            self.revoked.write().insert(token.to_string());
            self.notify(AuthEvent::SignedOut);
        }
        removed
    }

    /// Extend an active session's lifetime by one TTL.
    pub fn refresh(&self, token: &str) -> Option<Session> {
        let refreshed = {
            let mut map = self.sessions.write();
            let s = map.get_mut(token)?;
            if s.expires_at <= Instant::now() {
                return None;
            }
            s.expires_at = Instant::now() + self.ttl;
            s.clone()
        };
        self.notify(AuthEvent::TokenRefreshed);
        Some(refreshed)
    }

    /// Drop every session past its deadline. Returns how many were removed;
    /// each removal notifies subscribers as an expiry.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let dead: Vec<SessionToken> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| s.expires_at <= now)
            .map(|(t, _)| t.clone())
            .collect();
        if dead.is_empty() {
            return 0;
        }
        let mut map = self.sessions.write();
        let mut removed = 0usize;
        for token in dead {
            if map.remove(&token).is_some() {
                removed += 1;
                self.notify(AuthEvent::Expired);
            }
        }
        removed
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription { rx: self.events.subscribe() }
    }

    fn notify(&self, event: AuthEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Receiving side of the change feed. Dropping it unsubscribes.
pub struct Subscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl Subscription {
    /// Next event, or `None` once the manager is gone. A lagged receiver
    /// skips ahead rather than erroring; listeners only care that something
    /// changed, not how many times.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
