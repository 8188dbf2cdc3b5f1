//! Entity store boundary: raw models, the store trait and an in-memory backend

pub mod error;
pub mod memory;
pub mod models;
pub mod traits;

pub use error::{StoreError, StoreErrorCode, StoreResult};
pub use memory::{Fixture, MemoryStore};
pub use models::*;
pub use traits::{fetch_snapshot, EntityStore};

#[cfg(test)]
pub(crate) mod mock;
