use serde::Serialize;

use super::Role;

/// Snapshot of what the current client is permitted to see.
/// Derived, never persisted; replaced wholesale on every resolution so
/// readers always observe an internally consistent value.
///
/// Invariant: `session_active == false` implies `role == Anonymous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AccessState {
    pub role: Role,
    pub session_active: bool,
    pub loading: bool,
}

impl AccessState {
    /// Initial state before the first resolution completes.
    pub fn unresolved() -> AccessState {
        AccessState { role: Role::Anonymous, session_active: false, loading: true }
    }

    /// A completed resolution. The constructor enforces the invariant: an
    /// inactive session can only ever carry `Anonymous`.
    pub fn resolved(role: Role, session_active: bool) -> AccessState {
        let role = if session_active { role } else { Role::Anonymous };
        AccessState { role, session_active, loading: false }
    }

    /// The state after an explicit sign-out or an absent-session notification.
    pub fn anonymous() -> AccessState {
        AccessState::resolved(Role::Anonymous, false)
    }
}

/// Resolution lifecycle shared by the resolver and the route guard.
/// `Unresolved` is the only initial state; `Resolved` and `Denied` are
/// terminal until the next external session change restarts the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState<T> {
    Unresolved,
    Resolving,
    Resolved(T),
    Denied,
}

impl<T> ResolveState<T> {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResolveState::Resolved(_) | ResolveState::Denied)
    }
}
