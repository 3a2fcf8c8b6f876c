//! Fleet invites (`fleet:invite`/`:accept`/`:decline`).
//!
//! Membership itself is durable (`fleets`/`fleet_members` in
//! `starhold_persistence`); a pending invite is not — it is a promise
//! between two currently-connected players, scoped to process lifetime,
//! so it lives in the engine's in-memory table rather than a table of its
//! own. Fleet chat (`fleet:chat`) is likewise ephemeral: a direct
//! broadcast to the member list at send time, per the design
//! decision: ephemeral broadcast, not a persisted chat log.

use dashmap::DashMap;
use starhold_core::UserId;

#[derive(Debug, Clone, Copy)]
pub struct PendingInvite {
    pub fleet_id: i64,
    pub inviter_id: UserId,
}

#[derive(Default)]
pub struct InviteTable {
    pending: DashMap<UserId, PendingInvite>,
}

impl InviteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invite(&self, target: UserId, fleet_id: i64, inviter_id: UserId) {
        self.pending.insert(target, PendingInvite { fleet_id, inviter_id });
    }

    pub fn take(&self, target: UserId) -> Option<PendingInvite> {
        self.pending.remove(&target).map(|(_, v)| v)
    }
}
