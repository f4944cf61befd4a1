//! Role-gated session state: who the current client is, what they may see,
//! and how that answer stays consistent across login, logout and expiry.
//! Keep the public surface thin and split implementation across sub-modules.

mod access;
mod gate;
mod guard;
mod resolver;
mod role;

pub use access::{AccessState, ResolveState};
pub use gate::{visible_actions, NavAction, NavigationGate};
pub use guard::{GuardDecision, RouteGuard, SIGN_IN_PATH};
pub use resolver::{ResolverHandle, RoleResolver};
pub use role::Role;
