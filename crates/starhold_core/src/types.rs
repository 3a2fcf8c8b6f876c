//! Core identifier and value types shared by every crate in the server.
//!
//! These are the building blocks that cross crate boundaries: stable user
//! identity, the in-memory entity ids the spatial index tracks, and the
//! 2-D position/velocity pair the simulation works in.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable identifier for a registered user, assigned by the persistence
/// store on registration. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque bearer token minted on login/register, 128 bits of randomness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub u128);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

/// Runtime identifier for anything tracked by the spatial index: a ship,
/// an NPC, a projectile, an area effect. Unlike [`UserId`] this has no
/// durable meaning and is reassigned every process start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

static NEXT_ENTITY_ID: AtomicU64 = AtomicU64::new(1);

impl EntityId {
    /// Allocates a fresh, process-unique entity id.
    pub fn next() -> Self {
        Self(NEXT_ENTITY_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of entity an [`EntityId`] refers to, used by the spatial index
/// to answer "nearest object of kind K" queries without a second lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Ship,
    Npc,
    Projectile,
    AreaEffect,
    Wreckage,
}

/// A 2-D world position. Double precision because the world is unbounded
/// and sector coordinates grow large far from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn distance_squared(&self, other: Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Which sector this position falls in, given the sector size.
    pub fn sector(&self, sector_size: f64) -> (i32, i32) {
        (
            (self.x / sector_size).floor() as i32,
            (self.y / sector_size).floor() as i32,
        )
    }
}

/// A 2-D velocity, same precision rationale as [`Position`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f64,
    pub vy: f64,
}

impl Velocity {
    pub const fn new(vx: f64, vy: f64) -> Self {
        Self { vx, vy }
    }

    pub const fn zero() -> Self {
        Self { vx: 0.0, vy: 0.0 }
    }

    pub fn speed(&self) -> f64 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Upgradeable ship components. Each has an independent tier 1-5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    Engine,
    Weapon,
    Shield,
    Mining,
    Cargo,
    Radar,
    EnergyCore,
    Hull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponType {
    Blaster,
    Railgun,
    MissileLauncher,
    PlasmaCannon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceType {
    Iron,
    Copper,
    Titanium,
    Gold,
    Platinum,
    IceCrystal,
    ExoticMatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelicType {
    WormholeGem,
    ScannerCore,
    ShieldHarmonizer,
}

/// Why a connection was torn down, mirrored into `player:leave` broadcasts
/// and server logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DisconnectReason {
    ClientDisconnect,
    Timeout,
    ServerShutdown,
    Backpressure,
    Error(String),
}

/// Current high-level lifecycle state of an authenticated connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationStatus {
    Unauthenticated,
    Authenticated,
}

impl Default for AuthenticationStatus {
    fn default() -> Self {
        Self::Unauthenticated
    }
}

/// Milliseconds since the Unix epoch, used for protocol timestamps (not for
/// scheduling — see `starhold_sim`'s monotonic tick clock).
pub fn current_timestamp_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as u64
}
