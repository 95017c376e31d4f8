//! Error taxonomy shared by every crate in the workspace.
//!
//! Four buckets, matching the operational reality of an in-memory map with
//! an optional snapshot file:
//!
//! - [`Error::BadInput`] — malformed operation record or out-of-range
//!   config. Always carries the offending field and the constraint it
//!   violated.
//! - [`Error::Io`] — snapshot file problems: not found, unreadable,
//!   checksum mismatch, unknown format version.
//! - [`Error::Policy`] — a request would violate a runtime invariant that
//!   the caller could reasonably avoid (e.g. requesting a second migration
//!   while one is in flight).
//! - [`Error::Internal`] — an invariant *has* been violated. These are not
//!   meant to be recovered from; call sites that detect a violated
//!   invariant panic instead of constructing this variant, but it exists so
//!   tests and the snapshot verifier can report the violation precisely
//!   before aborting.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the adaptive hash map core.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input: a bad operation record, an invalid config value, or
    /// a CSV-level schema problem surfaced by a collaborator.
    #[error("bad input: field `{field}` {constraint}")]
    BadInput {
        /// Name of the offending field.
        field: String,
        /// Human-readable description of the constraint that was violated.
        constraint: String,
    },

    /// A file could not be read, written, or validated.
    #[error("io error at `{path}`: {cause}")]
    Io {
        /// Path of the file involved.
        path: String,
        /// Description of the failure.
        cause: String,
    },

    /// The request would violate a runtime invariant the caller controls.
    #[error("policy violation: {0}")]
    Policy(String),

    /// An invariant has already been violated. Fatal: the caller must not
    /// continue operating on the affected structure.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    /// Construct a [`Error::BadInput`].
    pub fn bad_input(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        Error::BadInput {
            field: field.into(),
            constraint: constraint.into(),
        }
    }

    /// Construct an [`Error::Io`].
    pub fn io(path: impl Into<String>, cause: impl Into<String>) -> Self {
        Error::Io {
            path: path.into(),
            cause: cause.into(),
        }
    }

    /// True for errors a caller might sensibly retry after changing
    /// something about the request (as opposed to [`Error::Internal`],
    /// which is never retryable).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BadInput { .. } | Error::Policy(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_input_message_names_field_and_constraint() {
        let err = Error::bad_input("max_lf_chaining", "must be in (0, 4]");
        let msg = err.to_string();
        assert!(msg.contains("max_lf_chaining"));
        assert!(msg.contains("must be in (0, 4]"));
    }

    #[test]
    fn io_message_names_path_and_cause() {
        let err = Error::io("/tmp/snap.bin", "checksum mismatch");
        let msg = err.to_string();
        assert!(msg.contains("/tmp/snap.bin"));
        assert!(msg.contains("checksum mismatch"));
    }

    #[test]
    fn retryability_matches_taxonomy() {
        assert!(Error::bad_input("x", "y").is_retryable());
        assert!(Error::Policy("migration in flight".into()).is_retryable());
        assert!(!Error::Internal("displacement invariant broken".into()).is_retryable());
        assert!(!Error::io("p", "c").is_retryable());
    }
}
