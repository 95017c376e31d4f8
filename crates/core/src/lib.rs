//! Shared types for the adaptive hash map workspace.
//!
//! This crate has no knowledge of either backend's internal layout; it
//! defines the vocabulary (`Key`, `Value`, `OperationRecord`), the error
//! taxonomy, the seeded hash, the shared `AdaptiveConfig`, and the
//! `MapBackend` capability trait that both backends implement.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;
pub mod traits;
pub mod types;

pub use config::{AdaptiveConfig, BackendKind};
pub use error::{Error, Result};
pub use hash::hash_key;
pub use traits::{MapBackend, Occupancy};
pub use types::{Key, Op, OperationRecord, Value};
