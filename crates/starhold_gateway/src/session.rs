//! Bearer-token sessions: an in-memory
//! `token -> {userId, createdAt, expiresAt}` map. Any read refreshes
//! expiry to `now + TTL`; a background sweep purges expired tokens.
//! Grounded on `starhold_core::shutdown::ShutdownState`'s pattern of a
//! small `Arc`-shared primitive guarded by atomics/concurrent maps rather
//! than a single `Mutex<HashMap>`, so auth reads never contend with the
//! sim tick or other connections.

use dashmap::DashMap;
use rand::RngCore;
use starhold_core::UserId;
use std::time::{Duration, Instant};

/// Opaque 128-bit bearer token, rendered as lowercase hex on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub u128);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl std::str::FromStr for SessionToken {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u128::from_str_radix(s, 16).map(SessionToken)
    }
}

struct SessionEntry {
    user_id: UserId,
    username: String,
    expires_at: Instant,
}

/// The in-memory session table. One per process; shared via `Arc`.
pub struct SessionManager {
    sessions: DashMap<SessionToken, SessionEntry>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self { sessions: DashMap::new(), ttl }
    }

    /// Mints a fresh token for `user_id`, as done on both register and
    /// login. Only one token per user is
    /// *required* to be recognized — minting a new one does not revoke
    /// any earlier token still held by the map, which is acceptable
    /// since multi-device play is intentionally allowed.
    pub fn create(&self, user_id: UserId, username: String) -> SessionToken {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        let token = SessionToken(u128::from_le_bytes(bytes));
        self.sessions.insert(
            token,
            SessionEntry { user_id, username, expires_at: Instant::now() + self.ttl },
        );
        token
    }

    /// Validates a token, refreshing its expiry on success
    /// (`auth:validate`: any read refreshes expiry).
    pub fn validate(&self, token: SessionToken) -> Option<(UserId, String)> {
        let mut entry = self.sessions.get_mut(&token)?;
        if entry.expires_at < Instant::now() {
            drop(entry);
            self.sessions.remove(&token);
            return None;
        }
        entry.expires_at = Instant::now() + self.ttl;
        Some((entry.user_id, entry.username.clone()))
    }

    pub fn revoke(&self, token: SessionToken) {
        self.sessions.remove(&token);
    }

    /// Background sweep purging expired tokens; intended to run on a
    /// slow interval from the gateway's own housekeeping loop.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| entry.expires_at >= now);
        before - self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_refreshes_expiry_and_resolves_user() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let token = sessions.create(UserId(7), "ada".to_string());
        let (user_id, username) = sessions.validate(token).expect("valid token");
        assert_eq!(user_id, UserId(7));
        assert_eq!(username, "ada");
    }

    #[test]
    fn expired_token_is_rejected_and_removed() {
        let sessions = SessionManager::new(Duration::from_millis(1));
        let token = sessions.create(UserId(1), "bob".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(sessions.validate(token).is_none());
        assert!(sessions.validate(token).is_none());
    }

    #[test]
    fn revoke_removes_token() {
        let sessions = SessionManager::new(Duration::from_secs(60));
        let token = sessions.create(UserId(1), "bob".to_string());
        sessions.revoke(token);
        assert!(sessions.validate(token).is_none());
    }
}
