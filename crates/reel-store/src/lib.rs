//! Durable store for generation jobs.
//!
//! [`JobStore`] is the only writer of the store file. Callers talk to it
//! through the [`JobRepository`] trait; [`JobStore::in_memory`] gives tests
//! the same actor without a backing file.

pub mod error;
pub mod repository;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use repository::{JobRepository, JobUpdate};
pub use store::JobStore;
