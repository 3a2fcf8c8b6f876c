//! Per-connection state: what the gateway remembers about one socket
//! between the moment it's accepted and the moment it closes.

use starhold_core::{AuthenticationStatus, UserId};
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// One connection's outgoing queue plus the bookkeeping the gateway needs
/// to route inbound commands and outbound broadcasts to it.
pub struct ClientConnection {
    /// The user this connection has authenticated as, once it has.
    pub user_id: Option<UserId>,

    pub remote_addr: SocketAddr,
    pub connected_at: SystemTime,
    auth_status: AuthenticationStatus,

    /// Bounded outbound queue (per-connection backpressure
    /// cap). The writer task drains this; `try_send` returning `Full`
    /// means the peer is stalled and the connection is torn down with a
    /// `backpressure` reason rather than growing the queue unbounded.
    pub outbound: mpsc::Sender<Message>,
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr, outbound: mpsc::Sender<Message>) -> Self {
        Self {
            user_id: None,
            remote_addr,
            connected_at: SystemTime::now(),
            auth_status: AuthenticationStatus::Unauthenticated,
            outbound,
        }
    }

    pub fn auth_status(&self) -> AuthenticationStatus {
        self.auth_status
    }

    pub fn authenticate(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
        self.auth_status = AuthenticationStatus::Authenticated;
    }
}
