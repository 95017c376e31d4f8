//! Key, value, and operation record types.
//!
//! Keys and values are opaque byte strings; non-byte-string value types are
//! out of scope. Equality is bytewise; both types
//! are cheap to clone so backends can freely carry copies around during
//! migration without fighting a borrow checker.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, bytewise-equal key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Key(pub Vec<u8>);

/// An opaque value. The empty string is a legal, present value — distinct
/// from a key being absent entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value(pub Vec<u8>);

impl Key {
    /// Build a key from anything that converts to bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Key(bytes.into())
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lossy UTF-8 view, for logging and display only.
    pub fn display(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl Value {
    /// Build a value from anything that converts to bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Value(bytes.into())
    }

    /// Borrow the underlying bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key(s.into_bytes())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value(s.into_bytes())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// The three operation kinds the core understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    /// Insert or overwrite.
    Put,
    /// Lookup.
    Get,
    /// Remove.
    Del,
}

impl Op {
    /// Stable lowercase label, used as the `op` field in tick records and
    /// as a map key in `ops_by_type`.
    pub fn label(self) -> &'static str {
        match self {
            Op::Put => "put",
            Op::Get => "get",
            Op::Del => "del",
        }
    }
}

/// A single validated operation consumed by the core. `value` is only
/// meaningful for [`Op::Put`]; it is ignored for `Get` and `Del`.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    /// The kind of operation.
    pub op: Op,
    /// The key being operated on.
    pub key: Key,
    /// The value to store, for `Put`. Ignored otherwise.
    pub value: Value,
}

impl OperationRecord {
    /// Construct a `put`.
    pub fn put(key: impl Into<Key>, value: impl Into<Value>) -> Self {
        OperationRecord {
            op: Op::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Construct a `get`.
    pub fn get(key: impl Into<Key>) -> Self {
        OperationRecord {
            op: Op::Get,
            key: key.into(),
            value: Value::new(Vec::new()),
        }
    }

    /// Construct a `del`.
    pub fn del(key: impl Into<Key>) -> Self {
        OperationRecord {
            op: Op::Del,
            key: key.into(),
            value: Value::new(Vec::new()),
        }
    }
}
