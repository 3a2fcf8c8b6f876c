//! The durable store (C3): Postgres via `diesel-async`, behind a single
//! `Store` handle the rest of the server shares as an `Arc`.

pub mod error;
pub mod models;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::Store;
