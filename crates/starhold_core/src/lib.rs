//! Types, spatial index, interest management, and shutdown/health
//! coordination shared by every crate in the server.
//!
//! This crate carries no game logic of its own — it is the vocabulary the
//! gateway, simulation, world generator, and persistence crates all speak:
//! stable identifiers ([`types`]), a concurrent uniform grid over the world
//! ([`spatial`]), the wire protocol ([`protocol`]), who-sees-what
//! ([`interest`]), tuning tables and validators ([`constants`]), and the
//! two small coordination primitives every long-running process needs
//! ([`shutdown`], [`monitoring`]).

pub mod constants;
pub mod error;
pub mod interest;
pub mod monitoring;
pub mod protocol;
pub mod shutdown;
pub mod spatial;
pub mod types;

pub use error::{GameError, GameResult};
pub use monitoring::{HealthReport, ServerMonitor};
pub use protocol::Envelope;
pub use shutdown::ShutdownState;
pub use spatial::SpatialGrid;
pub use types::*;
