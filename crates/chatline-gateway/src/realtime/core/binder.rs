use std::sync::Arc;

use chatline_core::error::{ChatError, Result};
use chatline_core::message::UserId;

use crate::obs::GatewayMetrics;
use crate::realtime::core::{ConnectionRegistry, PresenceBroadcaster};
use crate::realtime::types::Connection;

/// Identity claims carried on the connection handshake.
///
/// `auth` is the handshake auth field (the `x-user-id` header); `query` is the
/// `userId` query parameter. The auth field wins when both are present.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub auth: Option<String>,
    pub query: Option<String>,
}

impl Credentials {
    pub fn new(auth: Option<String>, query: Option<String>) -> Self {
        Self { auth, query }
    }

    /// Resolve the claimed identity. Blank values count as absent.
    pub fn identity(&self) -> Result<UserId> {
        [self.auth.as_deref(), self.query.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_owned)
            .ok_or(ChatError::Unauthenticated)
    }
}

/// A connection plus the identity it was bound to (if any).
///
/// Unbind uses the identity stored here rather than re-deriving it.
#[derive(Debug, Clone)]
pub struct BoundSession {
    conn: Connection,
    user: Option<UserId>,
}

impl BoundSession {
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Identity for routing; anonymous sessions may not send.
    pub fn identity(&self) -> Result<&str> {
        self.user().ok_or(ChatError::Unauthenticated)
    }
}

/// How an unbind resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbindOutcome {
    /// Registry entry removed.
    Removed,
    /// A newer connection owns the identity; entry left alone.
    Stale,
    /// Connection was never registered.
    Anonymous,
}

impl UnbindOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            UnbindOutcome::Removed => "removed",
            UnbindOutcome::Stale => "stale",
            UnbindOutcome::Anonymous => "anonymous",
        }
    }
}

/// Binds connections to identities and releases them on termination.
#[derive(Clone)]
pub struct SessionBinder {
    registry: Arc<ConnectionRegistry>,
    broadcaster: PresenceBroadcaster,
    metrics: Arc<GatewayMetrics>,
}

impl SessionBinder {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        broadcaster: PresenceBroadcaster,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            metrics,
        }
    }

    /// Attach `conn` and, when the handshake names a user, register it.
    ///
    /// Anonymous connections are still attached so they receive presence,
    /// but never become routable. Presence is announced in both cases.
    pub async fn bind(&self, conn: Connection, creds: &Credentials) -> BoundSession {
        let session = self.register(conn, creds);
        self.broadcaster.announce().await;
        session
    }

    /// Like [`SessionBinder::bind`], but the returned guard is armed before
    /// the announce await, so cancelling this future still unbinds.
    pub async fn bind_guarded(&self, conn: Connection, creds: &Credentials) -> (BoundSession, UnbindGuard) {
        let session = self.register(conn, creds);
        let guard = UnbindGuard::arm(self.clone(), session.clone());
        self.broadcaster.announce().await;
        (session, guard)
    }

    /// Registry half of a bind; no announce.
    pub fn register(&self, conn: Connection, creds: &Credentials) -> BoundSession {
        self.registry.attach(conn.clone());
        self.metrics.connections_open.inc(&[]);

        let user = match creds.identity() {
            Ok(user) => {
                if let Some(prev) = self.registry.put(user.clone(), conn.clone()) {
                    tracing::debug!(%user, replaced = %prev.id(), conn_id = %conn.id(), "identity rebound to newer connection");
                }
                self.metrics.connections_accepted.inc(&[("auth", "user")]);
                Some(user)
            }
            Err(_) => {
                self.metrics.connections_accepted.inc(&[("auth", "anonymous")]);
                None
            }
        };

        tracing::info!(conn_id = %conn.id(), user = user.as_deref().unwrap_or("-"), "connection bound");
        BoundSession { conn, user }
    }

    /// Release a session. Presence is announced even when nothing was removed.
    pub async fn unbind(&self, session: &BoundSession) -> UnbindOutcome {
        let outcome = self.deregister(session);
        self.broadcaster.announce().await;
        outcome
    }

    /// Registry half of an unbind; no announce.
    fn deregister(&self, session: &BoundSession) -> UnbindOutcome {
        self.registry.detach(session.conn.id());
        self.metrics.connections_open.dec(&[]);

        let outcome = match session.user() {
            None => UnbindOutcome::Anonymous,
            Some(user) if self.registry.remove_if_matches(user, &session.conn) => UnbindOutcome::Removed,
            Some(user) => {
                tracing::debug!(%user, conn_id = %session.conn.id(), "stale unbind ignored");
                UnbindOutcome::Stale
            }
        };

        self.metrics.unbinds.inc(&[("outcome", outcome.as_str())]);
        tracing::info!(conn_id = %session.conn.id(), outcome = outcome.as_str(), "connection unbound");
        outcome
    }
}

/// Runs `unbind` for a session on every exit path.
///
/// Call [`UnbindGuard::release`] on the normal path. If the guard is dropped
/// instead (panic, task cancellation) it spawns the unbind on the current
/// runtime.
pub struct UnbindGuard {
    armed: Option<(SessionBinder, BoundSession)>,
}

impl UnbindGuard {
    pub fn arm(binder: SessionBinder, session: BoundSession) -> Self {
        Self {
            armed: Some((binder, session)),
        }
    }

    pub async fn release(mut self) -> Option<UnbindOutcome> {
        let (binder, session) = self.armed.take()?;
        Some(binder.unbind(&session).await)
    }
}

impl Drop for UnbindGuard {
    fn drop(&mut self) {
        let Some((binder, session)) = self.armed.take() else { return; };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    binder.unbind(&session).await;
                });
            }
            Err(_) => {
                // No runtime left to announce on; still drop the mapping.
                binder.deregister(&session);
            }
        }
    }
}
