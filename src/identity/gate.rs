use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::backend::SessionProvider;
use crate::error::AppResult;

use super::{AccessState, Role, RoleResolver};

/// Actions the navigation surface may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavAction {
    SignIn,
    SignUp,
    UserDashboard,
    OwnerDashboard,
    AdminDashboard,
    SignOut,
}

/// Closed role-to-action mapping. While a resolution is in flight the gate
/// exposes nothing at all, so a pre-resolution frame can never leak a
/// privileged action.
pub fn visible_actions(state: &AccessState) -> &'static [NavAction] {
    if state.loading {
        return &[];
    }
    match state.role {
        Role::Anonymous => &[NavAction::SignIn, NavAction::SignUp],
        Role::User => &[NavAction::UserDashboard, NavAction::SignOut],
        Role::Owner => &[NavAction::OwnerDashboard, NavAction::SignOut],
        Role::Admin => &[NavAction::AdminDashboard, NavAction::SignOut],
    }
}

/// Navigation surface bound to one client session: reads the resolver's
/// snapshot for its action set and owns the sign-out operation.
pub struct NavigationGate {
    resolver: Arc<RoleResolver>,
    session: Arc<dyn SessionProvider>,
}

impl NavigationGate {
    pub fn new(resolver: Arc<RoleResolver>, session: Arc<dyn SessionProvider>) -> NavigationGate {
        NavigationGate { resolver, session }
    }

    pub fn actions(&self) -> &'static [NavAction] {
        visible_actions(&self.resolver.current())
    }

    /// Sign out and drop privileges immediately. The local reset runs
    /// unconditionally and before any change notification arrives; waiting
    /// for the async round trip would let a logged-out client keep seeing
    /// privileged actions on a slow network.
    pub async fn sign_out(&self) -> AppResult<()> {
        let result = self.session.sign_out().await;
        self.resolver.force_reset();
        info!("signed out, access state reset");
        result
    }
}
