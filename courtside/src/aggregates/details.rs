//! Admin edits of an occurrence's details.

use super::{OccurrenceEvent, admission};
use crate::error::Result;
use crate::recurrence;
use crate::types::{EventDefinition, Occurrence};
use chrono::{DateTime, Utc};
use smallvec::SmallVec;

type Events = SmallVec<[OccurrenceEvent; 4]>;

/// Replaces the details of `state` with `edited`.
///
/// The edit is validated like a new definition. Its date applies to this
/// occurrence only. Capacity follows `max_players` and may not drop below the
/// players already admitted; growth promotes from the waitlist.
pub(super) fn edit(
    state: &Occurrence,
    mut edited: EventDefinition,
    at: DateTime<Utc>,
) -> Result<Events> {
    edited.id = state.definition.id;
    edited.owner = state.definition.owner;
    edited.recurring = state.definition.recurring;

    let schedule = recurrence::validate(&edited)?;
    let capacity = edited.capacity();

    let unchanged = edited == state.definition
        && schedule.date == state.date
        && schedule.start_time == state.start_time
        && schedule.end_time == state.end_time;
    if unchanged && capacity == state.capacity {
        return Ok(SmallVec::new());
    }

    let resized = admission::resize(state, capacity, at)?;
    let mut events = Events::new();
    if !unchanged {
        events.push(OccurrenceEvent::DetailsEdited {
            definition: Box::new(edited),
            date: schedule.date,
            start_time: schedule.start_time,
            end_time: schedule.end_time,
            at,
        });
    }
    events.extend(resized);
    Ok(events)
}
