//! Projectile advance: integrate position, deliver a hit
//! on proximity or expiry, never touch state past their own lifetime.

use starhold_core::{EntityId, Position, UserId, Velocity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Owner {
    Player(UserId),
    Npc(EntityId),
}

#[derive(Debug, Clone)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: Owner,
    pub position: Position,
    pub velocity: Velocity,
    pub damage: f64,
    pub target: Option<EntityId>,
    pub spawned_at_tick: u64,
    pub expires_at_tick: u64,
}

/// Outcome of advancing one projectile for one tick.
pub enum Advance {
    Flying,
    Hit { target: EntityId },
    Expired,
}

const HIT_RADIUS: f64 = 12.0;

pub fn advance(
    projectile: &mut Projectile,
    now_tick: u64,
    dt_secs: f64,
    target_pos: Option<Position>,
) -> Advance {
    if now_tick >= projectile.expires_at_tick {
        return Advance::Expired;
    }

    projectile.position.x += projectile.velocity.vx * dt_secs;
    projectile.position.y += projectile.velocity.vy * dt_secs;

    if let (Some(target_id), Some(pos)) = (projectile.target, target_pos) {
        if projectile.position.distance(pos) <= HIT_RADIUS {
            return Advance::Hit { target: target_id };
        }
    }

    Advance::Flying
}
