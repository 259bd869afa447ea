use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use chatline_core::message::UserId;

use crate::realtime::types::{ConnId, Connection};

/// Connection registry:
/// - `user -> Connection` (one handle per identity, last bind wins)
/// - `conn_id -> Connection` for every open connection, anonymous included
///
/// All mutation goes through the atomic primitives below. There is no
/// registry-wide lock; DashMap shards keep unrelated identities independent.
#[derive(Default)]
pub struct ConnectionRegistry {
    users: DashMap<UserId, Connection>,
    peers: DashMap<ConnId, Connection>,
    seq: AtomicU64,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            peers: DashMap::new(),
            seq: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new transport connection.
    pub fn next_conn_id(&self) -> ConnId {
        ConnId(self.seq.fetch_add(1, Ordering::Relaxed))
    }

    /// Make a connection reachable by presence broadcasts.
    pub fn attach(&self, conn: Connection) {
        self.peers.insert(conn.id(), conn);
    }

    pub fn detach(&self, id: ConnId) -> bool {
        self.peers.remove(&id).is_some()
    }

    /// Record `user -> conn`, replacing any earlier handle. Returns the replaced one.
    pub fn put(&self, user: UserId, conn: Connection) -> Option<Connection> {
        self.users.insert(user, conn)
    }

    pub fn get(&self, user: &str) -> Option<Connection> {
        self.users.get(user).map(|r| r.value().clone())
    }

    /// Compare-and-delete: remove `user` only while it still maps to `conn`.
    pub fn remove_if_matches(&self, user: &str, conn: &Connection) -> bool {
        self.users
            .remove_if(user, |_, current| current.id() == conn.id())
            .is_some()
    }

    /// Sorted identities with a registered handle.
    pub fn snapshot_keys(&self) -> Vec<UserId> {
        let mut keys: Vec<UserId> = self.users.iter().map(|r| r.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Every attached connection, registered or anonymous.
    pub fn peers(&self) -> Vec<Connection> {
        self.peers.iter().map(|r| r.value().clone()).collect()
    }

    pub fn online_count(&self) -> usize {
        self.users.len()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}
