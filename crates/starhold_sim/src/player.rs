//! Per-connection runtime ship state, including transit gating.
//!
//! This is the sim thread's working copy of a ship; the persistence
//! store only sees it via periodic flush and on disconnect. Kept
//! deliberately flat (no nested component objects) to match how
//! `starhold_persistence::models::ShipRow` is laid out — one row, one
//! struct, same field names where they overlap.

use starhold_core::{ComponentKind, EntityId, Position, ResourceType, UserId, Velocity, WeaponType};
use std::collections::HashMap;

/// High-level lifecycle state a player ship can be in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LifecycleState {
    Alive,
    /// Cinematic death; physics skipped until respawn completes.
    Dead { respawn_at_tick: u64 },
    /// Post-respawn or post-transit grace window; still alive, takes no
    /// damage until `until_tick`.
    Invulnerable { until_tick: u64 },
    InTransit,
}

/// What a player is doing right now — mutually exclusive by
/// construction, which is how invariant 4 (at most one of
/// mining/loot/transit) is enforced.
#[derive(Debug, Clone)]
pub enum Activity {
    Mining(crate::mining::MiningSession),
    Loot(crate::loot::LootSession),
    Transit(crate::wormhole::Transit),
}

/// The latest movement intent posted by the connection-reader task,
/// consumed once per tick during input integration.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementIntent {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub rotation: f64,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub user_id: UserId,
    pub username: String,
    pub entity_id: EntityId,

    pub position: Position,
    pub velocity: Velocity,
    pub rotation: f64,

    pub hull_current: f64,
    pub hull_max: f64,
    pub shield_current: f64,
    pub shield_max: f64,
    pub credits: i64,

    pub engine_tier: u8,
    pub weapon_tier: u8,
    pub shield_tier: u8,
    pub mining_tier: u8,
    pub cargo_tier: u8,
    pub radar_tier: u8,
    pub energy_core_tier: u8,
    pub hull_tier: u8,
    pub weapon_type: WeaponType,
    pub ship_color_id: u32,
    pub profile_id: u32,

    pub inventory: HashMap<ResourceType, u32>,
    pub relics: Vec<starhold_core::RelicType>,

    pub lifecycle: LifecycleState,
    pub activity: Option<Activity>,

    pub pending_intent: Option<MovementIntent>,
    pub last_weapon_fire_tick: Option<u64>,
    pub last_shield_hit_tick: Option<u64>,
    pub last_chat_tick: Option<u64>,

    pub dirty: bool,
}

impl Player {
    #[allow(clippy::too_many_arguments)]
    pub fn from_ship(
        ship: &starhold_persistence::models::ShipRow,
        username: String,
        entity_id: EntityId,
        inventory: HashMap<ResourceType, u32>,
        relics: Vec<starhold_core::RelicType>,
    ) -> Self {
        Self {
            user_id: UserId(ship.user_id),
            username,
            entity_id,
            position: ship.position(),
            velocity: ship.velocity(),
            rotation: ship.rotation,
            hull_current: ship.hull_current,
            hull_max: ship.hull_max,
            shield_current: ship.shield_current,
            shield_max: ship.shield_max,
            credits: ship.credits,
            engine_tier: ship.engine_tier as u8,
            weapon_tier: ship.weapon_tier as u8,
            shield_tier: ship.shield_tier as u8,
            mining_tier: ship.mining_tier as u8,
            cargo_tier: ship.cargo_tier as u8,
            radar_tier: ship.radar_tier as u8,
            energy_core_tier: ship.energy_core_tier as u8,
            hull_tier: ship.hull_tier as u8,
            weapon_type: ship.weapon_type(),
            ship_color_id: ship.ship_color_id as u32,
            profile_id: ship.profile_id as u32,
            inventory,
            relics,
            lifecycle: LifecycleState::Alive,
            activity: None,
            pending_intent: None,
            last_weapon_fire_tick: None,
            last_shield_hit_tick: None,
            last_chat_tick: None,
            dirty: false,
        }
    }

    pub fn tier_of(&self, component: ComponentKind) -> u8 {
        match component {
            ComponentKind::Engine => self.engine_tier,
            ComponentKind::Weapon => self.weapon_tier,
            ComponentKind::Shield => self.shield_tier,
            ComponentKind::Mining => self.mining_tier,
            ComponentKind::Cargo => self.cargo_tier,
            ComponentKind::Radar => self.radar_tier,
            ComponentKind::EnergyCore => self.energy_core_tier,
            ComponentKind::Hull => self.hull_tier,
        }
    }

    pub fn cargo_used(&self) -> u32 {
        self.inventory.values().sum()
    }

    pub fn has_relic(&self, relic: starhold_core::RelicType) -> bool {
        self.relics.contains(&relic)
    }

    pub fn is_busy(&self) -> bool {
        self.activity.is_some()
    }

    pub fn sector(&self) -> (i32, i32) {
        self.position.sector(starhold_core::constants::SECTOR_SIZE)
    }
}
