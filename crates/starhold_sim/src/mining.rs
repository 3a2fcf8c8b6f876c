//! Mining sessions.
//!
//! A session binds the object being mined, when it started, and where the
//! player stood at that moment — not captured from the ship's *current*
//! position, since mining is "beam lock" and survives the player moving
//! (mining is not cancelled by client movement).

use starhold_core::ResourceType;

#[derive(Debug, Clone)]
pub struct MiningSession {
    pub object_id: String,
    pub resource: ResourceType,
    pub started_at_tick: u64,
    pub duration_ticks: u64,
}

impl MiningSession {
    pub fn is_complete(&self, now_tick: u64) -> bool {
        now_tick.saturating_sub(self.started_at_tick) >= self.duration_ticks
    }
}
