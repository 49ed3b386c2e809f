//! Read-side listing of occurrences for a calendar or an "upcoming" list.

use crate::color::{Color, color_for};
use crate::types::{Occurrence, OccurrenceId, Visibility};
use chrono::NaiveDateTime;
use serde::Serialize;

/// One row of a calendar listing
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CalendarEntry {
    /// Occurrence listed
    pub occurrence: OccurrenceId,
    /// Display title
    pub title: String,
    /// Venue
    pub location: String,
    /// Start
    pub start: NaiveDateTime,
    /// End
    pub end: NaiveDateTime,
    /// Color derived from the title
    pub color: Color,
    /// Whether joining needs approval
    pub visibility: Visibility,
    /// Whether every slot is taken
    pub is_full: bool,
    /// Free slots
    pub spots_left: u32,
    /// Queue length
    pub waitlisted: usize,
}

impl From<&Occurrence> for CalendarEntry {
    fn from(occurrence: &Occurrence) -> Self {
        let title = occurrence.title().to_string();
        Self {
            occurrence: occurrence.id,
            color: color_for(&title),
            title,
            location: occurrence.definition.location.clone(),
            start: occurrence.starts_at(),
            end: occurrence.ends_at(),
            visibility: occurrence.visibility(),
            is_full: occurrence.is_full(),
            spots_left: occurrence.spots_left(),
            waitlisted: occurrence.waitlist.len(),
        }
    }
}

/// Entries for `occurrences`, earliest first, ties broken by title
pub fn entries<'a>(occurrences: impl IntoIterator<Item = &'a Occurrence>) -> Vec<CalendarEntry> {
    let mut entries: Vec<CalendarEntry> = occurrences.into_iter().map(CalendarEntry::from).collect();
    entries.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));
    entries
}

/// Entries starting at or after `from`
pub fn upcoming<'a>(
    occurrences: impl IntoIterator<Item = &'a Occurrence>,
    from: NaiveDateTime,
) -> Vec<CalendarEntry> {
    entries(
        occurrences
            .into_iter()
            .filter(|occurrence| occurrence.starts_at() >= from),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::recurrence::{RecurrencePolicy, expand};
    use crate::types::{EventDefinition, UserId};
    use chrono::NaiveDate;

    fn series(title: &str, date: &str, start: &str) -> Vec<Occurrence> {
        let definition = EventDefinition::new(UserId::new(), title, date, start, "22:00").recurring(true);
        expand(&definition, RecurrencePolicy::weekly(3)).unwrap().collect()
    }

    #[test]
    fn sorted_by_start_then_title() {
        let mut all = series("Zebra Open", "2024-01-01", "18:00");
        all.extend(series("Alpha Ladder", "2024-01-01", "18:00"));
        all.extend(series("", "2024-01-03", "09:00"));

        let listing = entries(&all);
        let titles: Vec<_> = listing.iter().take(4).map(|e| e.title.as_str()).collect();
        assert_eq!(titles, ["Alpha Ladder", "Zebra Open", "Round Robin", "Alpha Ladder"]);
        assert!(listing.windows(2).all(|w| w[0].start <= w[1].start));
    }

    #[test]
    fn upcoming_filters_past() {
        let all = series("Weekly", "2024-01-01", "18:00");
        let from = NaiveDate::from_ymd_opt(2024, 1, 8)
            .unwrap()
            .and_hms_opt(18, 0, 0)
            .unwrap();

        let listing = upcoming(&all, from);
        assert_eq!(listing.len(), 2);
        assert_eq!(listing[0].start, from);
    }

    #[test]
    fn entry_reports_fill_state() {
        let mut occurrence = series("Weekly", "2024-01-01", "18:00").remove(0);
        occurrence.participants = (0..10).map(|_| UserId::new()).collect();
        occurrence.waitlist.push(UserId::new());

        let entry = CalendarEntry::from(&occurrence);
        assert!(entry.is_full);
        assert_eq!(entry.spots_left, 0);
        assert_eq!(entry.waitlisted, 1);
        assert_eq!(entry.color, color_for("Weekly"));
    }
}
