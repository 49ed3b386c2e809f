//! Admission decisions: joining, leaving, admin adds and removals, capacity edits.

use super::OccurrenceEvent;
use crate::error::{NotFound, Result, SchedulingError};
use crate::types::{Capacity, Membership, Occurrence, UserId};
use chrono::{DateTime, Utc};
use smallvec::{SmallVec, smallvec};

type Events = SmallVec<[OccurrenceEvent; 4]>;

pub(super) fn capacity_exceeded(state: &Occurrence) -> SchedulingError {
    SchedulingError::CapacityExceeded {
        occurrence: state.id,
        capacity: state.capacity.value(),
    }
}

/// Takes a free slot, else queues, else fails.
///
/// Users already queued are not queued twice; a pending join request has to be
/// decided by an admin first.
pub(super) fn admit(state: &Occurrence, user: UserId, at: DateTime<Utc>) -> Result<Events> {
    match state.membership(user) {
        Some(Membership::Participant) => Ok(SmallVec::new()),
        Some(Membership::Requested) => Err(SchedulingError::DuplicateRequest {
            occurrence: state.id,
            user,
            state: Membership::Requested,
        }),
        Some(Membership::Waitlisted) => Err(capacity_exceeded(state)),
        None if !state.is_full() => Ok(smallvec![OccurrenceEvent::ParticipantAdmitted { user, at }]),
        None if state.waitlist_open => Ok(smallvec![OccurrenceEvent::Waitlisted { user, at }]),
        None => Err(capacity_exceeded(state)),
    }
}

/// Takes `user` off the occurrence and refills the freed slot from the waitlist.
///
/// `removed` distinguishes an admin removal from a self-initiated leave.
pub(super) fn depart(
    state: &Occurrence,
    user: UserId,
    removed: bool,
    at: DateTime<Utc>,
) -> Result<Events> {
    match state.membership(user) {
        Some(Membership::Participant) => {
            let mut events: Events = if removed {
                smallvec![OccurrenceEvent::ParticipantRemoved { user, at }]
            } else {
                smallvec![OccurrenceEvent::ParticipantLeft { user, at }]
            };
            if let Some(&next) = state.waitlist.first() {
                events.push(OccurrenceEvent::PromotedFromWaitlist { user: next, at });
            }
            Ok(events)
        }
        Some(Membership::Waitlisted) => Ok(smallvec![OccurrenceEvent::LeftWaitlist { user, at }]),
        Some(Membership::Requested) | None => Err(NotFound::Participant {
            occurrence: state.id,
            user,
        }
        .into()),
    }
}

/// Admin add. Consumes a pending request or a waitlist spot if the user has one.
///
/// On a full occurrence the add fails unless `override_capacity` is set, in
/// which case capacity grows by one to make room.
pub(super) fn add_user(
    state: &Occurrence,
    user: UserId,
    override_capacity: bool,
    at: DateTime<Utc>,
) -> Result<Events> {
    let membership = state.membership(user);
    if membership == Some(Membership::Participant) {
        return Ok(SmallVec::new());
    }

    let mut events = Events::new();
    if state.is_full() {
        if !override_capacity {
            return Err(capacity_exceeded(state));
        }
        events.push(OccurrenceEvent::CapacityChanged {
            from: state.capacity,
            to: state.capacity.incremented(),
            at,
        });
    }

    match membership {
        Some(Membership::Requested) => {
            events.push(OccurrenceEvent::JoinRequestApproved { user, at });
            events.push(OccurrenceEvent::ParticipantAdmitted { user, at });
        }
        Some(Membership::Waitlisted) => {
            events.push(OccurrenceEvent::PromotedFromWaitlist { user, at });
        }
        _ => events.push(OccurrenceEvent::ParticipantAdmitted { user, at }),
    }
    Ok(events)
}

/// Changes capacity, promoting queued users into any new slots.
pub(super) fn set_capacity(
    state: &Occurrence,
    capacity: Capacity,
    at: DateTime<Utc>,
) -> Result<Events> {
    if capacity == state.capacity {
        return Ok(SmallVec::new());
    }
    if capacity < Capacity::MIN {
        return Err(SchedulingError::InvalidDefinition(format!(
            "capacity {capacity} is below the minimum of {}",
            Capacity::MIN
        )));
    }
    let format = state.definition.format;
    if !format.admits_capacity(capacity) {
        return Err(SchedulingError::InvalidDefinition(format!(
            "capacity {capacity} is outside the bounds of {}",
            format.label()
        )));
    }
    resize(state, capacity, at)
}

/// Moves to `capacity` if it still holds the current participants, promoting
/// queued users into any new slots. Format bounds are the caller's concern.
pub(super) fn resize(state: &Occurrence, capacity: Capacity, at: DateTime<Utc>) -> Result<Events> {
    if capacity == state.capacity {
        return Ok(SmallVec::new());
    }
    if capacity.value() < state.participant_count() {
        return Err(SchedulingError::InvalidDefinition(format!(
            "capacity {capacity} is below the {} players already admitted",
            state.participant_count()
        )));
    }

    let mut events: Events = smallvec![OccurrenceEvent::CapacityChanged {
        from: state.capacity,
        to: capacity,
        at,
    }];
    let free = capacity.value() - state.participant_count();
    let promoted = state
        .waitlist
        .iter()
        .take(usize::try_from(free).unwrap_or(usize::MAX));
    events.extend(
        promoted.map(|&user| OccurrenceEvent::PromotedFromWaitlist { user, at }),
    );
    Ok(events)
}

pub(super) fn set_waitlist_open(state: &Occurrence, open: bool, at: DateTime<Utc>) -> Events {
    match (state.waitlist_open, open) {
        (false, true) => smallvec![OccurrenceEvent::WaitlistOpened { at }],
        (true, false) => smallvec![OccurrenceEvent::WaitlistClosed { at }],
        _ => SmallVec::new(),
    }
}
