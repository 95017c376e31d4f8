//! The hybrid adaptive map (C7): owns one backend at a time, migrates
//! incrementally between backends (or to a larger copy of the same one)
//! under observed load, and can snapshot its live entries to disk.

#![warn(missing_docs)]

mod backend;
pub mod hybrid;
pub mod persistence;
pub mod snapshot;

pub use backend::Backend;
pub use hybrid::{Completion, HybridAdaptiveHashMap};
