//! Area effects: web-snare/acid-puddle zones that age out
//! and apply a per-tick effect to anything caught inside.

use starhold_core::{EntityId, Position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaEffectKind {
    WebSnare,
    AcidPuddle,
}

#[derive(Debug, Clone)]
pub struct AreaEffect {
    pub id: EntityId,
    pub kind: AreaEffectKind,
    pub position: Position,
    pub radius: f64,
    pub spawned_at_tick: u64,
    pub expires_at_tick: u64,
}

impl AreaEffect {
    pub fn is_expired(&self, now_tick: u64) -> bool {
        now_tick >= self.expires_at_tick
    }

    pub fn contains(&self, pos: Position) -> bool {
        self.position.distance(pos) <= self.radius
    }

    /// Per-tick effect applied to anything inside: a hull-damage-over-time
    /// amount and a speed multiplier (1.0 = unaffected).
    pub fn effect_per_tick(&self, dt_secs: f64) -> (f64, f64) {
        match self.kind {
            AreaEffectKind::WebSnare => (0.0, 0.35),
            AreaEffectKind::AcidPuddle => (4.0 * dt_secs, 1.0),
        }
    }
}
