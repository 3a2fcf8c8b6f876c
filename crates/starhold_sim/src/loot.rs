//! Wreckage and loot collection sessions.
//!
//! Wreckage is server-owned transient content: spawned when an NPC dies,
//! tracked in the spatial index under `EntityKind::Wreckage`, and removed
//! on collection or after `WRECKAGE_DECAY_MS`.

use starhold_core::{EntityId, Position, RelicType, ResourceType};

#[derive(Debug, Clone)]
pub struct Wreckage {
    pub id: EntityId,
    pub position: Position,
    pub credits: i64,
    pub resources: Vec<(ResourceType, u32)>,
    pub relics: Vec<RelicType>,
    pub spawned_at_tick: u64,
    /// Set once someone starts collecting, so a second player's
    /// `loot:collect` is rejected rather than double-awarding the loot.
    pub claimed_by: Option<starhold_core::UserId>,
}

impl Wreckage {
    pub fn wire_id(&self) -> String {
        format!("wreckage_{}", self.id.0)
    }

    pub fn is_expired(&self, now_tick: u64, decay_ticks: u64) -> bool {
        now_tick.saturating_sub(self.spawned_at_tick) >= decay_ticks
    }
}

#[derive(Debug, Clone)]
pub struct LootSession {
    pub wreckage_id: EntityId,
    pub started_at_tick: u64,
    pub duration_ticks: u64,
}

impl LootSession {
    pub fn is_complete(&self, now_tick: u64) -> bool {
        now_tick.saturating_sub(self.started_at_tick) >= self.duration_ticks
    }
}
