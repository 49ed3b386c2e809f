//! Courtside - recurring round robin scheduling
//!
//! Organizers define an event once; it expands into dated occurrences, each
//! with its own roster. Users join up to capacity, overflow onto a FIFO
//! waitlist, or, on private events, file join requests that an admin approves
//! or rejects.
//!
//! # Architecture
//!
//! ```text
//!  EventDefinition ──expand──▶ Occurrence × N ──▶ OccurrenceRepository
//!                                   ▲                     │
//!                                   │ reduce              │ load / save(version)
//!                                   │                     ▼
//!  join / admit / leave / ──▶  OccurrenceService ◀── CapabilityCheck
//!  approve / reject / edit     (retry on conflict)        (is_admin)
//!
//!  calendar::entries ◀── list ── color_for(title)
//! ```
//!
//! # Key Features
//!
//! ## 1. Last-slot safety
//!
//! Each mutation loads one occurrence with its version, decides against that
//! copy, and saves with the version it loaded. A concurrent save makes the
//! write fail and the cycle rerun, so the last slot goes to exactly one user.
//!
//! ```text
//! if participants < capacity   -> Admitted
//! else if waitlist open        -> Waitlisted
//! else                         -> CapacityExceeded (nothing changes)
//! ```
//!
//! ## 2. FIFO promotion
//!
//! A participant leaving (or being removed) hands the slot to the earliest
//! waitlisted user in the same write. No occurrence is ever stored with a free
//! slot and a non-empty waitlist.
//!
//! ## 3. Stable colors
//!
//! Titles hash to a fixed palette, identical across runs and processes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregates;
pub mod calendar;
pub mod color;
pub mod config;
pub mod error;
pub mod identity;
pub mod recurrence;
pub mod repository;
pub mod service;
pub mod types;

pub use aggregates::{OccurrenceCommand, OccurrenceEnvironment, OccurrenceEvent, OccurrenceReducer};
pub use calendar::CalendarEntry;
pub use color::{Color, color_for};
pub use config::Config;
pub use error::{ErrorKind, NotFound, SchedulingError};
pub use identity::{CapabilityCheck, StaticDirectory};
pub use recurrence::{DEFAULT_RECURRENCE_WEEKS, RecurrencePolicy, expand};
pub use repository::{InMemoryOccurrenceRepository, OccurrenceRepository, RepositoryError};
pub use service::{OccurrenceService, Receipt};
pub use types::*;
