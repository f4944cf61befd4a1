use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::backend::{ProfileStore, SessionProvider};

use super::{AccessState, Role};

/// How long a backend lookup may stall before the resolver falls back.
/// A timed-out session lookup resolves to `Anonymous`, a timed-out role
/// lookup to `User`, so `loading` never sticks.
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Derives the current [`AccessState`] from the session provider and the
/// profile store, and publishes it to readers through a watch channel.
///
/// Every resolution attempt takes a monotonically increasing ticket; only the
/// attempt holding the newest ticket may publish. A resolution overtaken by a
/// newer one (or by an explicit reset) while awaiting the backend publishes
/// nothing, so a stale privileged state can never survive a later sign-out.
pub struct RoleResolver {
    session: Arc<dyn SessionProvider>,
    profiles: Arc<dyn ProfileStore>,
    seq: AtomicU64,
    // Serializes the ticket check with the publish so the two are one step.
    publish_lock: Mutex<()>,
    tx: watch::Sender<AccessState>,
}

impl RoleResolver {
    pub fn new(session: Arc<dyn SessionProvider>, profiles: Arc<dyn ProfileStore>) -> RoleResolver {
        let (tx, _rx) = watch::channel(AccessState::unresolved());
        RoleResolver {
            session,
            profiles,
            seq: AtomicU64::new(0),
            publish_lock: Mutex::new(()),
            tx,
        }
    }

    /// Handle for readers. Each published value is a full replacement
    /// snapshot; readers never see a partially updated state.
    pub fn watch(&self) -> watch::Receiver<AccessState> {
        self.tx.subscribe()
    }

    /// Last published snapshot.
    pub fn current(&self) -> AccessState {
        *self.tx.borrow()
    }

    /// Re-derive the access state from backend truth.
    ///
    /// Idempotent: each call queries the session provider and, if an identity
    /// is present, the profile store, so it self-corrects if the role changed
    /// server-side. Returns the snapshot that ended up published, which may
    /// come from a newer attempt if this one was overtaken mid-flight.
    pub async fn resolve(&self) -> AccessState {
        let ticket = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        // Neutral placeholder while this resolution is in flight, so no
        // earlier privilege level flashes through.
        self.try_publish(ticket, AccessState::unresolved());

        let current = match timeout(LOOKUP_TIMEOUT, self.session.get_current()).await {
            Ok(cur) => cur,
            Err(_) => {
                warn!("session lookup timed out, resolving anonymous");
                None
            }
        };

        let resolved = match current {
            None => AccessState::anonymous(),
            Some(ident) => {
                let role = match timeout(LOOKUP_TIMEOUT, self.profiles.role_of(ident.user_id)).await
                {
                    Ok(Ok(attr)) => Role::from_attr(&attr),
                    Ok(Err(err)) => {
                        // Lookup failure degrades to the least-privileged
                        // authenticated role.
                        debug!(error = %err, "role lookup failed, defaulting to user");
                        Role::User
                    }
                    Err(_) => {
                        warn!("role lookup timed out, defaulting to user");
                        Role::User
                    }
                };
                AccessState::resolved(role, true)
            }
        };

        if self.try_publish(ticket, resolved) {
            resolved
        } else {
            debug!(ticket, "resolution overtaken, result dropped");
            self.current()
        }
    }

    /// Forcibly replace the state with `Anonymous` and invalidate every
    /// resolution currently in flight. This is the correctness-critical step
    /// of sign-out: it must not wait for the change-notification round trip.
    pub fn force_reset(&self) {
        let ticket = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.try_publish(ticket, AccessState::anonymous());
    }

    /// Subscribe to session change events (sign-in, sign-out, refresh,
    /// expiry) and re-resolve on each one. Dropping the returned handle
    /// cancels the listener and releases the subscription.
    pub fn attach(self: &Arc<Self>) -> ResolverHandle {
        let mut events = self.session.subscribe();
        let resolver = Arc::clone(self);
        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                debug!(?event, "session change, re-resolving");
                resolver.resolve().await;
            }
        });
        ResolverHandle { task }
    }

    fn try_publish(&self, ticket: u64, state: AccessState) -> bool {
        let _guard = self.publish_lock.lock();
        if self.seq.load(Ordering::SeqCst) != ticket {
            return false;
        }
        self.tx.send_replace(state);
        true
    }
}

/// Owner of the change-event listener; aborts it on drop. Leaking the handle
/// leaks the subscription.
pub struct ResolverHandle {
    task: JoinHandle<()>,
}

impl Drop for ResolverHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
