//! Central tracker for all client connections: connection-id allocation,
//! the user <-> connection mapping, and outbound delivery. Grounded on the
//! a `RwLock<HashMap>` keyed by an atomic
//! connection-id counter) with the `PlayerId`/GORC response-sender plumbing
//! replaced by a direct bounded `mpsc` queue per connection, since this
//! server has one writer task per socket rather than a broadcast fan-out
//! channel shared by all of them.

use super::{client::ClientConnection, ConnectionId};
use dashmap::DashMap;
use starhold_core::UserId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

pub struct ConnectionManager {
    connections: DashMap<ConnectionId, ClientConnection>,
    by_user: DashMap<UserId, ConnectionId>,
    next_id: AtomicUsize,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            by_user: DashMap::new(),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn add_connection(&self, remote_addr: SocketAddr, outbound: mpsc::Sender<Message>) -> ConnectionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.insert(id, ClientConnection::new(remote_addr, outbound));
        id
    }

    /// Removes a connection, returning the user it was authenticated as
    /// (if any) so the caller can tell the engine to flush that player.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Option<UserId> {
        let (_, connection) = self.connections.remove(&connection_id)?;
        if let Some(user_id) = connection.user_id {
            self.by_user.remove(&user_id);
        }
        connection.user_id
    }

    pub fn authenticate(&self, connection_id: ConnectionId, user_id: UserId) {
        if let Some(mut connection) = self.connections.get_mut(&connection_id) {
            connection.authenticate(user_id);
            self.by_user.insert(user_id, connection_id);
        }
    }

    pub fn user_of(&self, connection_id: ConnectionId) -> Option<UserId> {
        self.connections.get(&connection_id).and_then(|c| c.user_id)
    }

    pub fn connection_of_user(&self, user_id: UserId) -> Option<ConnectionId> {
        self.by_user.get(&user_id).map(|id| *id)
    }

    pub fn auth_status(&self, connection_id: ConnectionId) -> Option<starhold_core::AuthenticationStatus> {
        self.connections.get(&connection_id).map(|c| c.auth_status())
    }

    pub fn remote_addr(&self, connection_id: ConnectionId) -> Option<SocketAddr> {
        self.connections.get(&connection_id).map(|c| c.remote_addr)
    }

    /// Enqueues `message` for one connection. Returns `false` if the
    /// queue was full (the connection is stalled — caller should
    /// disconnect under the backpressure rule) or the connection
    /// no longer exists.
    pub fn try_send(&self, connection_id: ConnectionId, message: Message) -> bool {
        match self.connections.get(&connection_id) {
            Some(connection) => connection.outbound.try_send(message).is_ok(),
            None => false,
        }
    }

    /// Enqueues `message` for whichever connection `user_id` currently
    /// holds, if any (a player need not be connected for every engine
    /// event that names them, e.g. late persistence flushes).
    pub fn try_send_to_user(&self, user_id: UserId, message: Message) -> bool {
        match self.connection_of_user(user_id) {
            Some(connection_id) => self.try_send(connection_id, message),
            None => false,
        }
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Snapshot of every currently authenticated connection id, used for
    /// whole-server broadcasts (shutdown notices) that aren't filtered by
    /// interest radius.
    pub fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
