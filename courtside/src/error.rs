//! Error taxonomy for scheduling operations.
//!
//! Every variant renders a message a presentation layer can show as-is
//! ("event full", "already requested", "not authorized"). Use
//! [`SchedulingError::kind`] to branch on the category without matching fields.

use crate::types::{Membership, OccurrenceId, UserId};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What could not be found
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    /// No such occurrence in the repository
    #[error("occurrence {0} does not exist")]
    Occurrence(OccurrenceId),

    /// The user is neither a participant nor waitlisted
    #[error("user {user} is not on occurrence {occurrence}")]
    Participant {
        /// Occurrence searched
        occurrence: OccurrenceId,
        /// User not found
        user: UserId,
    },

    /// No pending join request from the user
    #[error("no pending join request from user {user} on occurrence {occurrence}")]
    JoinRequest {
        /// Occurrence searched
        occurrence: OccurrenceId,
        /// User without a pending request
        user: UserId,
    },
}

/// Errors returned by scheduling operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulingError {
    /// A date or time-of-day could not be parsed
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// The event definition breaks a rule (capacity, format bounds, rating window)
    #[error("invalid event: {0}")]
    InvalidDefinition(String),

    /// Every slot is taken and the user cannot be queued
    #[error("event full: occurrence {occurrence} has all {capacity} spots taken")]
    CapacityExceeded {
        /// Occurrence that is full
        occurrence: OccurrenceId,
        /// Its capacity
        capacity: u32,
    },

    /// The user already has a standing on the occurrence
    #[error("already requested: user {user} is {state} on occurrence {occurrence}")]
    DuplicateRequest {
        /// Occurrence concerned
        occurrence: OccurrenceId,
        /// User concerned
        user: UserId,
        /// Where the user already stands
        state: Membership,
    },

    /// Something referenced does not exist
    #[error(transparent)]
    NotFound(#[from] NotFound),

    /// A non-admin attempted an admin-only operation
    #[error("not authorized: user {user} may not {operation}")]
    Permission {
        /// Caller
        user: UserId,
        /// Operation attempted
        operation: &'static str,
    },

    /// Concurrent modifications kept winning the race
    #[error("occurrence {occurrence} kept changing underneath us, gave up after {attempts} attempts")]
    Conflict {
        /// Occurrence concerned
        occurrence: OccurrenceId,
        /// Attempts made
        attempts: u32,
    },

    /// The storage backend failed
    #[error("storage unavailable: {0}")]
    Persistence(String),

    /// A roster broke its own invariants; nothing was saved
    #[error("corrupt roster on occurrence {occurrence}: {reason}")]
    InvariantViolation {
        /// Occurrence concerned
        occurrence: OccurrenceId,
        /// First violation found
        reason: String,
    },
}

/// Stable category of a [`SchedulingError`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`SchedulingError::InvalidDate`]
    InvalidDate,
    /// See [`SchedulingError::InvalidDefinition`]
    InvalidDefinition,
    /// See [`SchedulingError::CapacityExceeded`]
    CapacityExceeded,
    /// See [`SchedulingError::DuplicateRequest`]
    DuplicateRequest,
    /// See [`SchedulingError::NotFound`]
    NotFound,
    /// See [`SchedulingError::Permission`]
    Permission,
    /// See [`SchedulingError::Conflict`]
    Conflict,
    /// See [`SchedulingError::Persistence`]
    Persistence,
    /// See [`SchedulingError::InvariantViolation`]
    InvariantViolation,
}

impl SchedulingError {
    /// Category of this error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidDate(_) => ErrorKind::InvalidDate,
            Self::InvalidDefinition(_) => ErrorKind::InvalidDefinition,
            Self::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            Self::DuplicateRequest { .. } => ErrorKind::DuplicateRequest,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Permission { .. } => ErrorKind::Permission,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Persistence(_) => ErrorKind::Persistence,
            Self::InvariantViolation { .. } => ErrorKind::InvariantViolation,
        }
    }

    /// Whether a fresh read-modify-write attempt may succeed
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::Persistence(_))
    }
}

/// Convenience alias for scheduling results
pub type Result<T> = std::result::Result<T, SchedulingError>;
