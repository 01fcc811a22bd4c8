//! Core traits defined in `backvault-core` and implemented by other crates.

pub mod object_store;

pub use object_store::{MAX_DELETE_BATCH, ObjectStore, ObjectSummary};
