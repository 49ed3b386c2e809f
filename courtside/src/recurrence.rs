//! Occurrence expansion.
//!
//! A definition expands to a single occurrence on its own date, or, when it is
//! recurring, to a fixed run of weekly occurrences starting on that date. Only
//! the date moves; start and end times are shared by the whole series.

use crate::error::{Result, SchedulingError};
use crate::types::{Capacity, EventDefinition, Occurrence, OccurrenceId};
use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Weekly occurrences generated for a recurring definition unless configured otherwise
pub const DEFAULT_RECURRENCE_WEEKS: u32 = 52;

/// How many weekly occurrences a recurring definition produces
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WeeklyRepr")]
pub struct RecurrencePolicy {
    weeks: u32,
}

#[derive(Deserialize)]
struct WeeklyRepr {
    weeks: u32,
}

impl From<WeeklyRepr> for RecurrencePolicy {
    fn from(repr: WeeklyRepr) -> Self {
        Self::weekly(repr.weeks)
    }
}

impl RecurrencePolicy {
    /// Policy producing `weeks` occurrences (at least one)
    #[must_use]
    pub const fn weekly(weeks: u32) -> Self {
        Self {
            weeks: if weeks == 0 { 1 } else { weeks },
        }
    }

    /// Run length of a recurring series
    #[must_use]
    pub const fn weeks(self) -> u32 {
        self.weeks
    }

    /// Number of occurrences `definition` expands to
    #[must_use]
    pub const fn run_length(self, definition: &EventDefinition) -> u32 {
        if definition.recurring { self.weeks } else { 1 }
    }
}

impl Default for RecurrencePolicy {
    fn default() -> Self {
        Self::weekly(DEFAULT_RECURRENCE_WEEKS)
    }
}

/// Parsed calendar fields of a definition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Schedule {
    /// First date of the series
    pub date: NaiveDate,
    /// Start time of day
    pub start_time: NaiveTime,
    /// End time of day
    pub end_time: NaiveTime,
}

impl Schedule {
    /// Parses the date (`YYYY-MM-DD`) and times (`HH:MM`) of `definition`
    ///
    /// # Errors
    ///
    /// Returns [`SchedulingError::InvalidDate`] if any field does not parse.
    pub fn parse(definition: &EventDefinition) -> Result<Self> {
        let date = NaiveDate::parse_from_str(definition.date.trim(), "%Y-%m-%d").map_err(|e| {
            SchedulingError::InvalidDate(format!("'{}' is not a calendar date: {e}", definition.date))
        })?;
        Ok(Self {
            date,
            start_time: parse_time(&definition.start_time)?,
            end_time: parse_time(&definition.end_time)?,
        })
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| SchedulingError::InvalidDate(format!("'{raw}' is not a time of day: {e}")))
}

/// Checks `definition` and returns its parsed schedule.
///
/// # Errors
///
/// - [`SchedulingError::InvalidDate`] if the date or a time does not parse
/// - [`SchedulingError::InvalidDefinition`] if capacity is below the minimum or
///   outside the format's bounds, the end time is not after the start time,
///   no rounds are set, or the rating window is inverted
pub fn validate(definition: &EventDefinition) -> Result<Schedule> {
    let schedule = Schedule::parse(definition)?;

    let capacity = definition.capacity();
    if capacity < Capacity::MIN {
        return Err(SchedulingError::InvalidDefinition(format!(
            "capacity {capacity} is below the minimum of {}",
            Capacity::MIN
        )));
    }
    if !definition.format.admits_capacity(capacity) {
        let (min, max) = definition.format.capacity_bounds();
        let max = max.map_or_else(|| "unbounded".to_string(), |max| max.to_string());
        return Err(SchedulingError::InvalidDefinition(format!(
            "{} needs between {min} and {max} players, got {capacity}",
            definition.format.label()
        )));
    }
    if schedule.end_time <= schedule.start_time {
        return Err(SchedulingError::InvalidDefinition(format!(
            "end time {} is not after start time {}",
            schedule.end_time, schedule.start_time
        )));
    }
    if definition.max_rounds == 0 {
        return Err(SchedulingError::InvalidDefinition(
            "at least one round is required".to_string(),
        ));
    }
    if let Some(range) = definition.rating_range {
        if range.min > range.max {
            return Err(SchedulingError::InvalidDefinition(format!(
                "rating range {}..{} is inverted",
                range.min, range.max
            )));
        }
    }

    Ok(schedule)
}

/// Expands `definition` into its occurrences.
///
/// Nothing is allocated up front: the returned iterator builds each occurrence
/// on demand and can be cloned to walk the series again.
///
/// # Errors
///
/// Fails as [`validate`] does, and with [`SchedulingError::InvalidDate`] if the
/// series would run past the end of the calendar.
pub fn expand(definition: &EventDefinition, policy: RecurrencePolicy) -> Result<Occurrences<'_>> {
    let schedule = validate(definition)?;
    let count = policy.run_length(definition);

    let last_offset = u64::from(count.saturating_sub(1)) * 7;
    if schedule.date.checked_add_days(Days::new(last_offset)).is_none() {
        return Err(SchedulingError::InvalidDate(format!(
            "{count} weekly occurrences from {} run past the calendar",
            schedule.date
        )));
    }

    Ok(Occurrences {
        definition,
        schedule,
        next: 0,
        count,
    })
}

/// Lazily built occurrences of one definition, in date order
#[derive(Clone, Debug)]
pub struct Occurrences<'a> {
    definition: &'a EventDefinition,
    schedule: Schedule,
    next: u32,
    count: u32,
}

impl Iterator for Occurrences<'_> {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        if self.next >= self.count {
            return None;
        }
        let sequence = self.next;
        let date = self
            .schedule
            .date
            .checked_add_days(Days::new(u64::from(sequence) * 7))?;
        self.next += 1;

        Some(Occurrence::new(
            OccurrenceId::new(self.definition.id, sequence),
            self.definition.clone(),
            date,
            self.schedule.start_time,
            self.schedule.end_time,
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.count - self.next).unwrap_or(usize::MAX);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Occurrences<'_> {}
