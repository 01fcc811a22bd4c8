//! # backvault-storage
//!
//! Object store implementations for Backvault. Supports S3-compatible
//! services (Backblaze B2, AWS, MinIO) and a local directory tree.

pub mod factory;
pub mod providers;
pub mod public_url;

pub use factory::open_store;
