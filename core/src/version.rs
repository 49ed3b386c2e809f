//! Versioning types for optimistic concurrency control.
//!
//! Every persisted aggregate carries a [`Version`]. A writer loads the aggregate,
//! mutates a copy, and saves it back stating the version it started from. If
//! somebody else saved in between, the versions disagree and the write is refused
//! instead of silently overwriting the other change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Aggregate version number for optimistic concurrency control.
///
/// Versions start at 0 when a record is first stored and increment by 1
/// on every successful save.
///
/// # Examples
///
/// ```
/// use courtside_core::version::Version;
///
/// let v0 = Version::INITIAL;
/// let v1 = v0.next();
/// assert_eq!(v1, Version::new(1));
/// assert_eq!(v1.value(), 1);
/// ```
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// The version of a freshly inserted record.
    pub const INITIAL: Self = Self(0);

    /// Create a new `Version` with the given value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the version number.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Get the next version (current + 1).
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    /// Check if this is the initial version (0).
    #[must_use]
    pub const fn is_initial(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl From<u64> for Version {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Version> for u64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// A value paired with the version it was read at.
///
/// Repositories hand out `Versioned<T>` from `load` and expect the same
/// version back on `save`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// The stored value
    pub value: T,
    /// Version the value was read at
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a value with a version.
    #[must_use]
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Split into the value and its version.
    #[must_use]
    pub fn into_parts(self) -> (T, Version) {
        (self.value, self.version)
    }

    /// Transform the value, keeping the version.
    #[must_use]
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Versioned<U> {
        Versioned {
            value: f(self.value),
            version: self.version,
        }
    }
}
