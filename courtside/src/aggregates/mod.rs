//! Aggregates for round robin scheduling.
//!
//! The occurrence roster is the only aggregate: participants, waitlist and
//! pending join requests of one dated occurrence, mutated through
//! [`OccurrenceReducer`].

mod admission;
mod details;
mod join_requests;
pub mod occurrence;

pub use occurrence::{
    OccurrenceCommand, OccurrenceEnvironment, OccurrenceEvent, OccurrenceReducer,
};
