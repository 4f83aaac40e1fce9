//! Document domain types
//!
//! The engine addresses documents by (collection, id) and tracks a
//! monotonic version per document:
//! - `DocumentKey` - collection-scoped document address
//! - `Version` - totally ordered write counter
//! - `VersionedDocument` - opaque JSON payload plus its version
//! - `PayloadProbe` - execution-time typed-decode check for read steps
//!
//! These are pure types with no behavior beyond construction and access.
//! Payloads stay opaque (`serde_json::Value`); typed views are produced at
//! the engine boundary via serde.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// A collection-scoped document address.
///
/// Keys are unique within a collection. The type is ordered and hashable so
/// it can key deterministic maps (snapshot caches, pending write sets).
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DocumentKey {
    collection: String,
    id: String,
}

impl DocumentKey {
    /// Creates a key addressing `id` within `collection`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Returns the collection name.
    #[inline]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Returns the document id within the collection.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A totally ordered document version.
///
/// Versions start at 1 on the first write of a key and are bumped by every
/// subsequent successful write. They are the sole authority for optimistic
/// commit conditions; wall-clock time is never consulted.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Version(u64);

impl Version {
    /// Creates a version with the given value.
    #[inline]
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The version assigned to the first write of a key.
    #[inline]
    pub fn first() -> Self {
        Self(1)
    }

    /// Returns the underlying counter value.
    ///
    /// This accessor exists for serialization and debugging only.
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the version a successful write on top of `self` produces.
    #[inline]
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// An opaque document payload together with the version it was read at.
///
/// Immutable once constructed; a transaction observes exactly one
/// `VersionedDocument` per key.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedDocument {
    payload: Value,
    version: Version,
}

impl VersionedDocument {
    /// Creates a versioned document.
    pub fn new(payload: Value, version: Version) -> Self {
        Self { payload, version }
    }

    /// Returns the opaque JSON payload.
    #[inline]
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Returns the version the payload was read at.
    #[inline]
    pub fn version(&self) -> Version {
        self.version
    }
}

/// An execution-time check that a stored payload decodes as a given type.
///
/// Read steps carry a probe instead of a deserialized value so the step
/// list stays a plain, printable data structure: the probe is a `fn`
/// pointer (never a capturing closure) and Debug output shows the type
/// name it checks for.
#[derive(Copy, Clone)]
pub struct PayloadProbe {
    type_name: &'static str,
    check: fn(&Value) -> Result<(), serde_json::Error>,
}

impl PayloadProbe {
    /// Creates a probe for `T`.
    pub fn of<T: DeserializeOwned>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            check: decode_check::<T>,
        }
    }

    /// Returns the name of the type this probe checks for.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Checks that `payload` decodes as the probed type.
    pub fn check(&self, payload: &Value) -> Result<(), serde_json::Error> {
        (self.check)(payload)
    }
}

impl fmt::Debug for PayloadProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PayloadProbe").field(&self.type_name).finish()
    }
}

fn decode_check<T: DeserializeOwned>(payload: &Value) -> Result<(), serde_json::Error> {
    serde_json::from_value::<T>(payload.clone()).map(|_| ())
}
