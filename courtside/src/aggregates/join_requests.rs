//! Moderated joining: request, approve, reject.

use super::OccurrenceEvent;
use super::admission::capacity_exceeded;
use crate::error::{NotFound, Result, SchedulingError};
use crate::types::{Occurrence, UserId};
use chrono::{DateTime, Utc};
use smallvec::{SmallVec, smallvec};

type Events = SmallVec<[OccurrenceEvent; 4]>;

pub(super) fn submit(state: &Occurrence, user: UserId, at: DateTime<Utc>) -> Result<Events> {
    if let Some(standing) = state.membership(user) {
        return Err(SchedulingError::DuplicateRequest {
            occurrence: state.id,
            user,
            state: standing,
        });
    }
    Ok(smallvec![OccurrenceEvent::JoinRequested { user, at }])
}

/// Resolves a pending request into an admission.
///
/// If the occurrence is full and its waitlist closed, the approval fails and
/// the request stays pending so it can be approved once a slot frees up.
pub(super) fn approve(state: &Occurrence, user: UserId, at: DateTime<Utc>) -> Result<Events> {
    if state.pending_request(user).is_none() {
        return Err(NotFound::JoinRequest {
            occurrence: state.id,
            user,
        }
        .into());
    }

    let admission = if !state.is_full() {
        OccurrenceEvent::ParticipantAdmitted { user, at }
    } else if state.waitlist_open {
        OccurrenceEvent::Waitlisted { user, at }
    } else {
        return Err(capacity_exceeded(state));
    };

    Ok(smallvec![
        OccurrenceEvent::JoinRequestApproved { user, at },
        admission
    ])
}

/// Discards a pending request. Rejecting an absent request changes nothing.
pub(super) fn reject(state: &Occurrence, user: UserId, at: DateTime<Utc>) -> Events {
    if state.pending_request(user).is_some() {
        smallvec![OccurrenceEvent::JoinRequestRejected { user, at }]
    } else {
        SmallVec::new()
    }
}
