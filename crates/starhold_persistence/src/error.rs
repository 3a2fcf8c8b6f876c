//! Errors the store surfaces, mapped by callers onto the
//! `PersistenceError` / `StateError` taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("connection pool exhausted or unavailable")]
    Pool(#[from] diesel_async::pooled_connection::deadpool::PoolError),

    #[error("failed to build connection pool: {0}")]
    PoolBuild(#[from] diesel_async::pooled_connection::deadpool::BuildError),

    #[error("database error: {0}")]
    Db(#[from] diesel::result::Error),

    #[error("user not found")]
    UserNotFound,

    #[error("username already taken")]
    UsernameTaken,

    #[error("listing not found")]
    ListingNotFound,

    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("insufficient quantity")]
    InsufficientQuantity,

    #[error("cargo hold full")]
    CargoFull,

    #[error("not the owner of this listing")]
    NotOwner,

    #[error("component already at maximum tier")]
    MaxTier,

    #[error("insufficient resources for upgrade")]
    InsufficientResources,

    #[error("fleet not found")]
    FleetNotFound,

    #[error("fleet is full")]
    FleetFull,

    #[error("already a fleet member")]
    AlreadyInFleet,
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for starhold_core::GameError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UserNotFound => starhold_core::GameError::Auth("Invalid credentials".to_string()),
            StoreError::UsernameTaken => {
                starhold_core::GameError::Validation("Username already taken".to_string())
            }
            StoreError::ListingNotFound => {
                starhold_core::GameError::State("Listing not found".to_string())
            }
            StoreError::InsufficientCredits => {
                starhold_core::GameError::State("Insufficient credits".to_string())
            }
            StoreError::InsufficientQuantity => {
                starhold_core::GameError::State("Not enough quantity available".to_string())
            }
            StoreError::CargoFull => starhold_core::GameError::State("Cargo hold full".to_string()),
            StoreError::NotOwner => {
                starhold_core::GameError::State("You do not own this listing".to_string())
            }
            StoreError::MaxTier => {
                starhold_core::GameError::State("Component already at maximum tier".to_string())
            }
            StoreError::InsufficientResources => {
                starhold_core::GameError::State("Insufficient resources for upgrade".to_string())
            }
            StoreError::FleetNotFound => starhold_core::GameError::State("Fleet not found".to_string()),
            StoreError::FleetFull => starhold_core::GameError::State("Fleet is full".to_string()),
            StoreError::AlreadyInFleet => {
                starhold_core::GameError::State("Already in a fleet".to_string())
            }
            StoreError::Pool(_) | StoreError::PoolBuild(_) | StoreError::Db(_) => {
                starhold_core::GameError::Persistence(e.to_string())
            }
        }
    }
}
