//! Domain types for round robin scheduling.
//!
//! An [`EventDefinition`] is what an organizer submits. The recurrence expander
//! turns it into one or more [`Occurrence`]s, each of which tracks its own
//! participants, waitlist and pending join requests.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Title shown for events created without one.
pub const DEFAULT_TITLE: &str = "Round Robin";

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event definition (a series, when recurring)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to a user owned by the external identity store
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one dated occurrence: the owning event plus its week index.
///
/// Derived rather than generated, so expanding the same definition twice
/// yields the same identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OccurrenceId {
    /// Owning event definition
    pub event: EventId,
    /// 0-based position in the series
    pub sequence: u32,
}

impl OccurrenceId {
    /// Creates the identifier for position `sequence` of `event`
    #[must_use]
    pub const fn new(event: EventId, sequence: u32) -> Self {
        Self { event, sequence }
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.event, self.sequence)
    }
}

// ============================================================================
// Value Objects
// ============================================================================

/// Maximum number of participants an occurrence admits
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Capacity(u32);

impl Capacity {
    /// Smallest capacity that can run a round robin (two courts of doubles need four players)
    pub const MIN: Self = Self(4);

    /// Creates a new capacity
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(self) -> u32 {
        self.0
    }

    /// The capacity one larger than this one
    #[must_use]
    pub const fn incremented(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who can join without moderation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Anyone may join directly
    #[default]
    Public,
    /// Non-admins must submit a join request
    Private,
}

/// How play is organized
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GameFormat {
    /// Open play, no scores kept
    #[default]
    Regular,
    /// Same partner every round, scored per team
    SetPartners,
    /// New partner every round, scored per player
    RotatingPartners,
    /// Teams of four compete against other teams
    Team,
}

impl GameFormat {
    /// Inclusive `(min, max)` capacity allowed for this format; `None` means unbounded
    #[must_use]
    pub const fn capacity_bounds(self) -> (u32, Option<u32>) {
        match self {
            Self::Regular | Self::Team => (Capacity::MIN.value(), None),
            Self::SetPartners => (4, Some(16)),
            Self::RotatingPartners => (4, Some(20)),
        }
    }

    /// Whether `capacity` fits this format
    #[must_use]
    pub const fn admits_capacity(self, capacity: Capacity) -> bool {
        let (min, max) = self.capacity_bounds();
        let value = capacity.value();
        if value < min {
            return false;
        }
        match max {
            Some(max) => value <= max,
            None => true,
        }
    }

    /// Human readable name
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Regular => "Regular Play",
            Self::SetPartners => "Round Robin: Set Partners",
            Self::RotatingPartners => "Round Robin: Rotating Partners",
            Self::Team => "Team Pickleball",
        }
    }
}

/// Skill rating window players are expected to fall in
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRange {
    /// Lowest expected rating
    pub min: f32,
    /// Highest expected rating
    pub max: f32,
}

// ============================================================================
// Event Definition
// ============================================================================

/// An event as submitted by its organizer.
///
/// Dates and times are kept in the submitted text form (`YYYY-MM-DD`, `HH:MM`);
/// they are parsed when the definition is expanded into occurrences.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Identifier of the event (and of the series, when recurring)
    pub id: EventId,
    /// User who created the event
    pub owner: UserId,
    /// Display title; empty titles display as [`DEFAULT_TITLE`]
    pub title: String,
    /// Venue
    pub location: String,
    /// Base date, `YYYY-MM-DD`
    pub date: String,
    /// Start time of day, `HH:MM`
    pub start_time: String,
    /// End time of day, `HH:MM`
    pub end_time: String,
    /// Free-form description of the game
    pub description: String,
    /// Whether joining needs admin approval
    pub visibility: Visibility,
    /// How play is organized
    pub format: GameFormat,
    /// Participant capacity
    pub max_players: u32,
    /// Rounds played
    pub max_rounds: u32,
    /// Scoring mode label, e.g. "1 Match"
    pub scoring: String,
    /// Whether partners rotate between rounds
    pub rotating_partners: bool,
    /// Whether the event repeats weekly
    pub recurring: bool,
    /// Expected skill window
    pub rating_range: Option<RatingRange>,
    /// Whether scores are submitted to DUPR
    pub submit_scores_to_dupr: bool,
    /// Price text shown to players
    pub cost: Option<String>,
    /// External registration or info link
    pub join_link: Option<String>,
}

impl EventDefinition {
    /// Creates a one-off public event with the form defaults (10 players, 2 rounds, "1 Match")
    #[must_use]
    pub fn new(
        owner: UserId,
        title: impl Into<String>,
        date: impl Into<String>,
        start_time: impl Into<String>,
        end_time: impl Into<String>,
    ) -> Self {
        Self {
            id: EventId::new(),
            owner,
            title: title.into(),
            location: String::new(),
            date: date.into(),
            start_time: start_time.into(),
            end_time: end_time.into(),
            description: String::new(),
            visibility: Visibility::Public,
            format: GameFormat::Regular,
            max_players: 10,
            max_rounds: 2,
            scoring: "1 Match".to_string(),
            rotating_partners: false,
            recurring: false,
            rating_range: None,
            submit_scores_to_dupr: false,
            cost: None,
            join_link: None,
        }
    }

    /// Sets the participant capacity
    #[must_use]
    pub const fn with_max_players(mut self, max_players: u32) -> Self {
        self.max_players = max_players;
        self
    }

    /// Marks the event as weekly recurring (or not)
    #[must_use]
    pub const fn recurring(mut self, recurring: bool) -> Self {
        self.recurring = recurring;
        self
    }

    /// Sets the visibility
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Sets the game format
    #[must_use]
    pub const fn with_format(mut self, format: GameFormat) -> Self {
        self.format = format;
        self.rotating_partners = matches!(format, GameFormat::RotatingPartners);
        self
    }

    /// Title to display, falling back to [`DEFAULT_TITLE`]
    #[must_use]
    pub fn display_title(&self) -> &str {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            DEFAULT_TITLE
        } else {
            trimmed
        }
    }

    /// Capacity as a typed value
    #[must_use]
    pub const fn capacity(&self) -> Capacity {
        Capacity::new(self.max_players)
    }
}

// ============================================================================
// Occurrence
// ============================================================================

/// A pending, admin-moderated request to join an occurrence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    /// Requesting user
    pub user: UserId,
    /// When the request was submitted
    pub requested_at: DateTime<Utc>,
}

/// Where a user currently stands on an occurrence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Membership {
    /// Holds a participant slot
    Participant,
    /// Queued for the next free slot
    Waitlisted,
    /// Waiting for an admin decision
    Requested,
}

impl fmt::Display for Membership {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Participant => write!(f, "a participant"),
            Self::Waitlisted => write!(f, "on the waitlist"),
            Self::Requested => write!(f, "awaiting approval"),
        }
    }
}

/// One concrete, dated instance of an event definition.
///
/// `participants`, `waitlist` and `join_requests` are pairwise disjoint,
/// `participants.len() <= capacity`, and the waitlist is only non-empty while
/// every slot is taken.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    /// Identifier
    pub id: OccurrenceId,
    /// Definition this occurrence was expanded from
    pub definition: EventDefinition,
    /// This occurrence's own date
    pub date: NaiveDate,
    /// Start time of day
    pub start_time: NaiveTime,
    /// End time of day
    pub end_time: NaiveTime,
    /// Current capacity (starts at the definition's, admins may change it)
    pub capacity: Capacity,
    /// Whether new users may queue once the occurrence is full
    pub waitlist_open: bool,
    /// Admitted users, in admission order
    pub participants: Vec<UserId>,
    /// Queued users, earliest first
    pub waitlist: Vec<UserId>,
    /// Pending requests, in submission order
    pub join_requests: Vec<JoinRequest>,
}

impl Occurrence {
    /// Creates an empty occurrence with an open waitlist
    #[must_use]
    pub fn new(
        id: OccurrenceId,
        definition: EventDefinition,
        date: NaiveDate,
        start_time: NaiveTime,
        end_time: NaiveTime,
    ) -> Self {
        let capacity = definition.capacity();
        Self {
            id,
            definition,
            date,
            start_time,
            end_time,
            capacity,
            waitlist_open: true,
            participants: Vec::new(),
            waitlist: Vec::new(),
            join_requests: Vec::new(),
        }
    }

    /// Display title inherited from the definition
    #[must_use]
    pub fn title(&self) -> &str {
        self.definition.display_title()
    }

    /// Visibility inherited from the definition
    #[must_use]
    pub const fn visibility(&self) -> Visibility {
        self.definition.visibility
    }

    /// Start as a calendar date-time
    #[must_use]
    pub const fn starts_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.start_time)
    }

    /// End as a calendar date-time
    #[must_use]
    pub const fn ends_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.end_time)
    }

    /// Number of admitted participants
    #[must_use]
    pub fn participant_count(&self) -> u32 {
        u32::try_from(self.participants.len()).unwrap_or(u32::MAX)
    }

    /// Free participant slots
    #[must_use]
    pub fn spots_left(&self) -> u32 {
        self.capacity.value().saturating_sub(self.participant_count())
    }

    /// Whether every slot is taken
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.spots_left() == 0
    }

    /// Whether `user` holds a participant slot
    #[must_use]
    pub fn is_participant(&self, user: UserId) -> bool {
        self.participants.contains(&user)
    }

    /// Whether `user` is queued
    #[must_use]
    pub fn is_waitlisted(&self, user: UserId) -> bool {
        self.waitlist.contains(&user)
    }

    /// The pending request of `user`, if any
    #[must_use]
    pub fn pending_request(&self, user: UserId) -> Option<&JoinRequest> {
        self.join_requests.iter().find(|request| request.user == user)
    }

    /// Where `user` stands, if anywhere
    #[must_use]
    pub fn membership(&self, user: UserId) -> Option<Membership> {
        if self.is_participant(user) {
            Some(Membership::Participant)
        } else if self.is_waitlisted(user) {
            Some(Membership::Waitlisted)
        } else if self.pending_request(user).is_some() {
            Some(Membership::Requested)
        } else {
            None
        }
    }

    /// Checks the roster invariants, describing the first violation found
    ///
    /// # Errors
    ///
    /// Returns a description of the broken invariant.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.participant_count() > self.capacity.value() {
            return Err(format!(
                "{} participants exceed capacity {}",
                self.participants.len(),
                self.capacity
            ));
        }
        if !self.waitlist.is_empty() && !self.is_full() {
            return Err(format!(
                "{} waitlisted while {} spots are free",
                self.waitlist.len(),
                self.spots_left()
            ));
        }

        let mut seen = std::collections::HashSet::new();
        let everyone = self
            .participants
            .iter()
            .chain(&self.waitlist)
            .chain(self.join_requests.iter().map(|request| &request.user));
        for user in everyone {
            if !seen.insert(*user) {
                return Err(format!("user {user} appears more than once"));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Results
// ============================================================================

/// Result of an admission attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Admission {
    /// The user took a participant slot
    Admitted,
    /// The user already held a slot; nothing changed
    AlreadyAdmitted,
    /// The occurrence is full; the user was queued
    Waitlisted,
}

/// Result of a leave or removal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Departure {
    /// Where the user was before leaving
    pub from: Membership,
    /// Waitlisted user promoted into the freed slot
    pub promoted: Option<UserId>,
}

/// Result of the self-service join entry point
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOutcome {
    /// Joined (or queued) directly
    Admission(Admission),
    /// The occurrence is moderated; a join request was filed
    Requested(JoinRequest),
}
