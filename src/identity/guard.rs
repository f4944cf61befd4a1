use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::timeout;
use tracing::debug;

use crate::backend::{SessionIdentity, SessionProvider};

use super::ResolveState;

/// Where denied clients are sent. The navigation must replace the current
/// history entry rather than push, so back-navigation cannot resurface the
/// guarded content.
pub const SIGN_IN_PATH: &str = "/auth/login";

const SESSION_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a guard check over a protected subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session confirmed; render the protected content.
    Render(SessionIdentity),
    /// No session; navigate to the sign-in entry point and render nothing.
    Redirect(&'static str),
}

/// Gates rendering of a subtree behind "a session is currently active".
///
/// Deliberately role-blind: role-specific authorization belongs to the
/// navigation gate and the destination page. Until the session check
/// completes the guard reports `Resolving` and callers must render a neutral
/// indicator, neither the protected content nor a premature redirect.
pub struct RouteGuard {
    session: Arc<dyn SessionProvider>,
    state: Mutex<ResolveState<SessionIdentity>>,
}

impl RouteGuard {
    pub fn new(session: Arc<dyn SessionProvider>) -> RouteGuard {
        RouteGuard { session, state: Mutex::new(ResolveState::Unresolved) }
    }

    pub fn state(&self) -> ResolveState<SessionIdentity> {
        self.state.lock().clone()
    }

    /// Check session presence and decide. A hung provider counts as absent
    /// rather than holding the pending state forever.
    pub async fn check(&self) -> GuardDecision {
        *self.state.lock() = ResolveState::Resolving;
        let current = match timeout(SESSION_CHECK_TIMEOUT, self.session.get_current()).await {
            Ok(cur) => cur,
            Err(_) => None,
        };
        match current {
            Some(ident) => {
                *self.state.lock() = ResolveState::Resolved(ident.clone());
                GuardDecision::Render(ident)
            }
            None => {
                debug!("no active session, redirecting to {}", SIGN_IN_PATH);
                *self.state.lock() = ResolveState::Denied;
                GuardDecision::Redirect(SIGN_IN_PATH)
            }
        }
    }
}
