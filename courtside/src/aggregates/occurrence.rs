//! Occurrence roster aggregate.
//!
//! Owns one occurrence's participants, waitlist and pending join requests.
//! Commands are decided against the current roster first; only when the whole
//! command is accepted are its events applied, so a rejected command never
//! leaves a half-applied roster behind.
//!
//! Authorization is not checked here. Callers decide who may issue admin
//! commands (see [`crate::service::OccurrenceService`]).

use super::{admission, details, join_requests};
use crate::error::SchedulingError;
use crate::types::{
    Admission, Capacity, Departure, EventDefinition, JoinRequest, Membership, Occurrence, UserId,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use courtside_core::{SmallVec, environment::Clock, reducer::Reducer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Commands
// ============================================================================

/// Intents against one occurrence roster
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OccurrenceCommand {
    /// Take a slot, or queue if full and the waitlist is open
    Admit {
        /// Joining user
        user: UserId,
    },

    /// Give up a slot or a waitlist spot
    Leave {
        /// Leaving user
        user: UserId,
    },

    /// Admin: put a user on the roster directly
    AddUser {
        /// User to add
        user: UserId,
        /// Grow capacity by one if the occurrence is full
        override_capacity: bool,
    },

    /// Admin: take a user off the roster
    RemoveUser {
        /// User to remove
        user: UserId,
    },

    /// Ask an admin for a slot
    SubmitJoinRequest {
        /// Requesting user
        user: UserId,
    },

    /// Admin: accept a pending request
    ApproveJoinRequest {
        /// Requesting user
        user: UserId,
    },

    /// Admin: discard a pending request
    RejectJoinRequest {
        /// Requesting user
        user: UserId,
    },

    /// Admin: allow or stop queueing once full
    SetWaitlistOpen {
        /// New setting
        open: bool,
    },

    /// Admin: change the number of slots
    SetCapacity {
        /// New capacity
        capacity: Capacity,
    },

    /// Admin: replace the details of this occurrence.
    ///
    /// Identity, owner and recurrence of the current definition are kept;
    /// `max_players` becomes the new capacity.
    EditDetails {
        /// Edited definition
        definition: Box<EventDefinition>,
    },
}

// ============================================================================
// Events
// ============================================================================

/// Facts recorded against an occurrence roster
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum OccurrenceEvent {
    /// A user took a free slot
    ParticipantAdmitted {
        /// Admitted user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A user was queued at the back of the waitlist
    Waitlisted {
        /// Queued user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A participant gave up their slot
    ParticipantLeft {
        /// Leaving user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// An admin took a participant off the roster
    ParticipantRemoved {
        /// Removed user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A waitlisted user moved into a slot
    PromotedFromWaitlist {
        /// Promoted user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A user left (or was taken off) the waitlist
    LeftWaitlist {
        /// User leaving the queue
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A join request was filed
    JoinRequested {
        /// Requesting user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A pending request was accepted; an admission follows
    JoinRequestApproved {
        /// Requesting user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// A pending request was discarded
    JoinRequestRejected {
        /// Requesting user
        user: UserId,
        /// When
        at: DateTime<Utc>,
    },
    /// Queueing was enabled
    WaitlistOpened {
        /// When
        at: DateTime<Utc>,
    },
    /// Queueing was disabled; existing entries stay
    WaitlistClosed {
        /// When
        at: DateTime<Utc>,
    },
    /// Capacity changed
    CapacityChanged {
        /// Previous capacity
        from: Capacity,
        /// New capacity
        to: Capacity,
        /// When
        at: DateTime<Utc>,
    },
    /// Title, schedule or other details were edited
    DetailsEdited {
        /// Definition now in effect
        definition: Box<EventDefinition>,
        /// Date of this occurrence
        date: NaiveDate,
        /// Start time of day
        start_time: NaiveTime,
        /// End time of day
        end_time: NaiveTime,
        /// When
        at: DateTime<Utc>,
    },
}

impl OccurrenceEvent {
    /// When the event happened
    #[must_use]
    pub const fn at(&self) -> DateTime<Utc> {
        match self {
            Self::ParticipantAdmitted { at, .. }
            | Self::Waitlisted { at, .. }
            | Self::ParticipantLeft { at, .. }
            | Self::ParticipantRemoved { at, .. }
            | Self::PromotedFromWaitlist { at, .. }
            | Self::LeftWaitlist { at, .. }
            | Self::JoinRequested { at, .. }
            | Self::JoinRequestApproved { at, .. }
            | Self::JoinRequestRejected { at, .. }
            | Self::WaitlistOpened { at }
            | Self::WaitlistClosed { at }
            | Self::CapacityChanged { at, .. }
            | Self::DetailsEdited { at, .. } => *at,
        }
    }

    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ParticipantAdmitted { .. } => "ParticipantAdmitted",
            Self::Waitlisted { .. } => "Waitlisted",
            Self::ParticipantLeft { .. } => "ParticipantLeft",
            Self::ParticipantRemoved { .. } => "ParticipantRemoved",
            Self::PromotedFromWaitlist { .. } => "PromotedFromWaitlist",
            Self::LeftWaitlist { .. } => "LeftWaitlist",
            Self::JoinRequested { .. } => "JoinRequested",
            Self::JoinRequestApproved { .. } => "JoinRequestApproved",
            Self::JoinRequestRejected { .. } => "JoinRequestRejected",
            Self::WaitlistOpened { .. } => "WaitlistOpened",
            Self::WaitlistClosed { .. } => "WaitlistClosed",
            Self::CapacityChanged { .. } => "CapacityChanged",
            Self::DetailsEdited { .. } => "DetailsEdited",
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

impl Admission {
    /// Reads the admission of `user` off the events of an admit, add or approve.
    ///
    /// No admission event means the user was already on the roster.
    #[must_use]
    pub fn from_events(user: UserId, events: &[OccurrenceEvent]) -> Self {
        events
            .iter()
            .find_map(|event| match event {
                OccurrenceEvent::ParticipantAdmitted { user: u, .. }
                | OccurrenceEvent::PromotedFromWaitlist { user: u, .. }
                    if *u == user =>
                {
                    Some(Self::Admitted)
                }
                OccurrenceEvent::Waitlisted { user: u, .. } if *u == user => Some(Self::Waitlisted),
                _ => None,
            })
            .unwrap_or(Self::AlreadyAdmitted)
    }
}

impl Departure {
    /// Reads a departure off the events of a leave or removal.
    #[must_use]
    pub fn from_events(events: &[OccurrenceEvent]) -> Option<Self> {
        let from = events.iter().find_map(|event| match event {
            OccurrenceEvent::ParticipantLeft { .. } | OccurrenceEvent::ParticipantRemoved { .. } => {
                Some(Membership::Participant)
            }
            OccurrenceEvent::LeftWaitlist { .. } => Some(Membership::Waitlisted),
            _ => None,
        })?;
        let promoted = events.iter().find_map(|event| match event {
            OccurrenceEvent::PromotedFromWaitlist { user, .. } => Some(*user),
            _ => None,
        });
        Some(Self { from, promoted })
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Dependencies of the occurrence reducer
#[derive(Clone)]
pub struct OccurrenceEnvironment {
    /// Timestamps for recorded events
    pub clock: Arc<dyn Clock>,
}

impl OccurrenceEnvironment {
    /// Creates a new `OccurrenceEnvironment`
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for occurrence rosters
#[derive(Clone, Copy, Debug, Default)]
pub struct OccurrenceReducer;

impl OccurrenceReducer {
    /// Creates a new `OccurrenceReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Applies an event to the roster
    pub fn apply_event(state: &mut Occurrence, event: &OccurrenceEvent) {
        match event {
            OccurrenceEvent::ParticipantAdmitted { user, .. } => state.participants.push(*user),
            OccurrenceEvent::Waitlisted { user, .. } => state.waitlist.push(*user),
            OccurrenceEvent::ParticipantLeft { user, .. }
            | OccurrenceEvent::ParticipantRemoved { user, .. } => {
                state.participants.retain(|u| u != user);
            }
            OccurrenceEvent::PromotedFromWaitlist { user, .. } => {
                state.waitlist.retain(|u| u != user);
                state.participants.push(*user);
            }
            OccurrenceEvent::LeftWaitlist { user, .. } => state.waitlist.retain(|u| u != user),
            OccurrenceEvent::JoinRequested { user, at } => state.join_requests.push(JoinRequest {
                user: *user,
                requested_at: *at,
            }),
            OccurrenceEvent::JoinRequestApproved { user, .. }
            | OccurrenceEvent::JoinRequestRejected { user, .. } => {
                state.join_requests.retain(|request| request.user != *user);
            }
            OccurrenceEvent::WaitlistOpened { .. } => state.waitlist_open = true,
            OccurrenceEvent::WaitlistClosed { .. } => state.waitlist_open = false,
            OccurrenceEvent::CapacityChanged { to, .. } => state.capacity = *to,
            OccurrenceEvent::DetailsEdited {
                definition,
                date,
                start_time,
                end_time,
                ..
            } => {
                state.definition = definition.as_ref().clone();
                state.date = *date;
                state.start_time = *start_time;
                state.end_time = *end_time;
            }
        }
    }
}

impl Reducer for OccurrenceReducer {
    type State = Occurrence;
    type Action = OccurrenceCommand;
    type Event = OccurrenceEvent;
    type Error = SchedulingError;
    type Environment = OccurrenceEnvironment;

    fn reduce(
        &self,
        state: &mut Occurrence,
        action: OccurrenceCommand,
        env: &OccurrenceEnvironment,
    ) -> Result<SmallVec<[OccurrenceEvent; 4]>, SchedulingError> {
        let at = env.clock.now();
        check_roster(state)?;

        let events = match action {
            OccurrenceCommand::Admit { user } => admission::admit(state, user, at)?,
            OccurrenceCommand::Leave { user } => admission::depart(state, user, false, at)?,
            OccurrenceCommand::AddUser {
                user,
                override_capacity,
            } => admission::add_user(state, user, override_capacity, at)?,
            OccurrenceCommand::RemoveUser { user } => admission::depart(state, user, true, at)?,
            OccurrenceCommand::SubmitJoinRequest { user } => join_requests::submit(state, user, at)?,
            OccurrenceCommand::ApproveJoinRequest { user } => {
                join_requests::approve(state, user, at)?
            }
            OccurrenceCommand::RejectJoinRequest { user } => join_requests::reject(state, user, at),
            OccurrenceCommand::SetWaitlistOpen { open } => {
                admission::set_waitlist_open(state, open, at)
            }
            OccurrenceCommand::SetCapacity { capacity } => {
                admission::set_capacity(state, capacity, at)?
            }
            OccurrenceCommand::EditDetails { definition } => details::edit(state, *definition, at)?,
        };

        let mut next = state.clone();
        for event in &events {
            Self::apply_event(&mut next, event);
        }
        check_roster(&next)?;
        *state = next;

        Ok(events)
    }
}

fn check_roster(state: &Occurrence) -> Result<(), SchedulingError> {
    state.check_invariants().map_err(|reason| {
        tracing::error!(occurrence = %state.id, %reason, "Roster invariant broken");
        SchedulingError::InvariantViolation {
            occurrence: state.id,
            reason,
        }
    })
}
