//! Fixed-tick simulation engine (C6): the authoritative game loop that
//! ties the spatial index, connected players, NPCs, projectiles, and
//! every transient subsystem into the one process this server runs.
//!
//! Everything below `engine` is a standalone building block — a pure
//! state transition (`combat`, `npc`, `hazard`), a small owned-state
//! struct (`player`, `mining`, `loot`, `wormhole`), or an in-memory table
//! (`fleet`) — kept unit-testable in isolation from the tick loop that
//! drives them.

pub mod area_effect;
pub mod combat;
pub mod engine;
pub mod fleet;
pub mod hazard;
pub mod loot;
pub mod mining;
pub mod npc;
pub mod player;
pub mod projectile;
pub mod wormhole;

pub use engine::{Engine, Outbound};
pub use player::Player;
