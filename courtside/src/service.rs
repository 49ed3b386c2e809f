//! Transactional entry points for scheduling.
//!
//! [`OccurrenceService`] ties the reducer to its collaborators. Every roster
//! mutation is one read-modify-write cycle against a single occurrence:
//!
//! 1. load the occurrence with its version
//! 2. run the command through [`OccurrenceReducer`] on that copy
//! 3. save it back, stating the version loaded
//!
//! If another writer saved in between, step 3 fails with a conflict and the
//! whole cycle reruns on fresh state, up to the configured retry limit. Two
//! users racing for the last slot can therefore never both be admitted.
//! Operations on different occurrences never coordinate.

use crate::aggregates::{OccurrenceCommand, OccurrenceEnvironment, OccurrenceEvent, OccurrenceReducer};
use crate::calendar::{self, CalendarEntry};
use crate::config::Config;
use crate::error::{Result, SchedulingError};
use crate::identity::CapabilityCheck;
use crate::recurrence::{self, RecurrencePolicy};
use crate::repository::OccurrenceRepository;
use crate::types::{
    Admission, Capacity, Departure, EventDefinition, EventId, JoinOutcome, JoinRequest, Occurrence,
    OccurrenceId, UserId, Visibility,
};
use chrono::NaiveDateTime;
use courtside_core::environment::Clock;
use courtside_core::reducer::Reducer;
use courtside_core::retry::{RetryPolicy, retry_if};
use courtside_core::version::Version;
use futures::future::try_join_all;
use std::sync::Arc;

/// Result of a roster mutation
#[derive(Clone, Debug, PartialEq)]
pub struct Receipt<T> {
    /// Operation-specific result
    pub outcome: T,
    /// Facts recorded, in order; empty when nothing changed
    pub events: Vec<OccurrenceEvent>,
    /// Version of the occurrence after the operation
    pub version: Version,
}

/// Scheduling service over a repository and an identity provider
#[derive(Clone)]
pub struct OccurrenceService {
    repository: Arc<dyn OccurrenceRepository>,
    identity: Arc<dyn CapabilityCheck>,
    environment: OccurrenceEnvironment,
    reducer: OccurrenceReducer,
    recurrence: RecurrencePolicy,
    retry: RetryPolicy,
    waitlist_open: bool,
}

impl OccurrenceService {
    /// Creates a service with default recurrence and retry policies
    #[must_use]
    pub fn new(
        repository: Arc<dyn OccurrenceRepository>,
        identity: Arc<dyn CapabilityCheck>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            identity,
            environment: OccurrenceEnvironment::new(clock),
            reducer: OccurrenceReducer::new(),
            recurrence: RecurrencePolicy::default(),
            retry: RetryPolicy::default(),
            waitlist_open: true,
        }
    }

    /// Applies recurrence, retry and waitlist settings from `config`
    #[must_use]
    pub fn with_config(mut self, config: &Config) -> Self {
        self.recurrence = config.recurrence_policy();
        self.retry = config.retry_policy();
        self.waitlist_open = config.scheduling.waitlist_open;
        self
    }

    /// Sets the recurrence run length
    #[must_use]
    pub const fn with_recurrence(mut self, recurrence: RecurrencePolicy) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Sets the conflict retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // ------------------------------------------------------------------
    // Event lifecycle
    // ------------------------------------------------------------------

    /// Validates, expands and stores a definition, returning the new occurrence ids.
    ///
    /// If storing fails partway, occurrences already stored are removed again.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::Permission`] if `actor` is not an admin
    /// - [`SchedulingError::InvalidDate`] / [`SchedulingError::InvalidDefinition`]
    ///   if the definition does not validate
    /// - [`SchedulingError::Persistence`] on storage failure
    pub async fn schedule_event(
        &self,
        actor: UserId,
        definition: EventDefinition,
    ) -> Result<Vec<OccurrenceId>> {
        self.require_admin(actor, "create events").await?;

        let occurrences = recurrence::expand(&definition, self.recurrence)?;
        let mut stored = Vec::with_capacity(occurrences.len());
        for mut occurrence in occurrences {
            occurrence.waitlist_open = self.waitlist_open;
            let id = occurrence.id;
            if let Err(error) = self.repository.insert(occurrence).await {
                tracing::warn!(event = %definition.id, error = %error, "Scheduling failed, rolling back");
                for id in &stored {
                    if let Err(cleanup) = self.repository.delete(*id).await {
                        tracing::warn!(occurrence = %id, error = %cleanup, "Rollback delete failed");
                    }
                }
                return Err(error.into());
            }
            stored.push(id);
        }

        tracing::info!(
            event = %definition.id,
            title = definition.display_title(),
            occurrences = stored.len(),
            "Event scheduled"
        );
        Ok(stored)
    }

    /// Deletes one occurrence. Its roster and pending requests go with it.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins, [`SchedulingError::NotFound`]
    /// if the occurrence does not exist.
    pub async fn delete_occurrence(&self, actor: UserId, id: OccurrenceId) -> Result<()> {
        self.require_admin(actor, "delete events").await?;
        self.repository.delete(id).await?;
        tracing::info!(occurrence = %id, "Occurrence deleted");
        Ok(())
    }

    /// Deletes every occurrence of `event`, returning how many were removed.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins, storage errors otherwise.
    pub async fn cancel_series(&self, actor: UserId, event: EventId) -> Result<usize> {
        self.require_admin(actor, "delete events").await?;
        let occurrences = self.repository.list_for_event(event).await?;
        let deletes = occurrences
            .iter()
            .map(|occurrence| self.repository.delete(occurrence.id));
        let removed = try_join_all(deletes).await?.len();
        tracing::info!(event = %event, removed, "Series cancelled");
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Current state of an occurrence
    ///
    /// # Errors
    ///
    /// [`SchedulingError::NotFound`] if it does not exist.
    pub async fn occurrence(&self, id: OccurrenceId) -> Result<Occurrence> {
        Ok(self.repository.load(id).await?.value)
    }

    /// Calendar listing of every occurrence, or only those starting at or after `from`
    ///
    /// # Errors
    ///
    /// Storage errors only.
    pub async fn calendar(&self, from: Option<NaiveDateTime>) -> Result<Vec<CalendarEntry>> {
        let occurrences = self.repository.list().await?;
        Ok(match from {
            Some(from) => calendar::upcoming(&occurrences, from),
            None => calendar::entries(&occurrences),
        })
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Self-service join.
    ///
    /// Public occurrences (and admins on any occurrence) admit directly; a
    /// non-admin joining a private occurrence files a join request instead.
    ///
    /// # Errors
    ///
    /// As [`Self::attempt_admit`] or [`Self::submit_join_request`].
    pub async fn join(&self, user: UserId, id: OccurrenceId) -> Result<Receipt<JoinOutcome>> {
        let admin = self.identity.is_admin(user).await;
        let (events, version) = self
            .execute(id, |occurrence| {
                if admin || occurrence.visibility() == Visibility::Public {
                    OccurrenceCommand::Admit { user }
                } else {
                    OccurrenceCommand::SubmitJoinRequest { user }
                }
            })
            .await?;

        let outcome = match join_request_of(user, &events) {
            Some(request) => JoinOutcome::Requested(request),
            None => JoinOutcome::Admission(Admission::from_events(user, &events)),
        };
        tracing::info!(occurrence = %id, user = %user, outcome = ?outcome, "Join handled");
        Ok(Receipt {
            outcome,
            events,
            version,
        })
    }

    /// Admits `user`, queueing them if the occurrence is full.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::CapacityExceeded`] if full and the user cannot be queued
    /// - [`SchedulingError::DuplicateRequest`] if the user has a pending join request
    /// - [`SchedulingError::NotFound`] if the occurrence does not exist
    /// - [`SchedulingError::Conflict`] if concurrent writers kept winning
    pub async fn attempt_admit(&self, user: UserId, id: OccurrenceId) -> Result<Receipt<Admission>> {
        let (events, version) = self.execute(id, |_| OccurrenceCommand::Admit { user }).await?;
        let outcome = Admission::from_events(user, &events);
        log_admission(id, user, outcome);
        Ok(Receipt {
            outcome,
            events,
            version,
        })
    }

    /// Takes `user` off the occurrence, promoting the earliest waitlisted user.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::NotFound`] if the user is neither a participant nor waitlisted.
    pub async fn attempt_leave(&self, user: UserId, id: OccurrenceId) -> Result<Receipt<Departure>> {
        let (events, version) = self.execute(id, |_| OccurrenceCommand::Leave { user }).await?;
        departure_receipt(id, user, events, version)
    }

    /// Admin add, optionally growing capacity to fit.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins;
    /// [`SchedulingError::CapacityExceeded`] if full and `override_capacity` is unset.
    pub async fn add_user(
        &self,
        actor: UserId,
        id: OccurrenceId,
        user: UserId,
        override_capacity: bool,
    ) -> Result<Receipt<Admission>> {
        self.require_admin(actor, "add users").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::AddUser {
                user,
                override_capacity,
            })
            .await?;
        let outcome = Admission::from_events(user, &events);
        log_admission(id, user, outcome);
        Ok(Receipt {
            outcome,
            events,
            version,
        })
    }

    /// Admin removal, promoting the earliest waitlisted user.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins;
    /// [`SchedulingError::NotFound`] if the user is not on the occurrence.
    pub async fn remove_user(
        &self,
        actor: UserId,
        id: OccurrenceId,
        user: UserId,
    ) -> Result<Receipt<Departure>> {
        self.require_admin(actor, "remove users").await?;
        let (events, version) = self.execute(id, |_| OccurrenceCommand::RemoveUser { user }).await?;
        departure_receipt(id, user, events, version)
    }

    // ------------------------------------------------------------------
    // Join requests
    // ------------------------------------------------------------------

    /// Files a join request for an admin to decide.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::DuplicateRequest`] if the user already requested,
    /// holds a slot, or is waitlisted.
    pub async fn submit_join_request(
        &self,
        user: UserId,
        id: OccurrenceId,
    ) -> Result<Receipt<JoinRequest>> {
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::SubmitJoinRequest { user })
            .await?;
        let outcome = join_request_of(user, &events).ok_or_else(|| {
            SchedulingError::Persistence(format!("join request from {user} was not recorded"))
        })?;
        tracing::info!(occurrence = %id, user = %user, "Join request submitted");
        Ok(Receipt {
            outcome,
            events,
            version,
        })
    }

    /// Approves a pending request and admits (or queues) the user.
    ///
    /// If the occurrence is full and its waitlist closed, the approval fails and
    /// the request stays pending.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::Permission`] for non-admins
    /// - [`SchedulingError::NotFound`] if no request is pending (already resolved, say)
    /// - [`SchedulingError::CapacityExceeded`] as described above
    pub async fn approve(
        &self,
        actor: UserId,
        id: OccurrenceId,
        user: UserId,
    ) -> Result<Receipt<Admission>> {
        self.require_admin(actor, "approve join requests").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::ApproveJoinRequest { user })
            .await?;
        let outcome = Admission::from_events(user, &events);
        tracing::info!(occurrence = %id, user = %user, approved_by = %actor, outcome = ?outcome, "Join request approved");
        Ok(Receipt {
            outcome,
            events,
            version,
        })
    }

    /// Rejects a pending request. Returns whether a request was discarded.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins.
    pub async fn reject(&self, actor: UserId, id: OccurrenceId, user: UserId) -> Result<Receipt<bool>> {
        self.require_admin(actor, "reject join requests").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::RejectJoinRequest { user })
            .await?;
        let discarded = !events.is_empty();
        if discarded {
            tracing::info!(occurrence = %id, user = %user, rejected_by = %actor, "Join request rejected");
        } else {
            tracing::debug!(occurrence = %id, user = %user, "No pending request to reject");
        }
        Ok(Receipt {
            outcome: discarded,
            events,
            version,
        })
    }

    // ------------------------------------------------------------------
    // Roster settings
    // ------------------------------------------------------------------

    /// Opens or closes the waitlist. Closing keeps users already queued.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins.
    pub async fn set_waitlist_open(
        &self,
        actor: UserId,
        id: OccurrenceId,
        open: bool,
    ) -> Result<Receipt<bool>> {
        self.require_admin(actor, "change the waitlist").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::SetWaitlistOpen { open })
            .await?;
        tracing::info!(occurrence = %id, open, "Waitlist setting changed");
        Ok(Receipt {
            outcome: open,
            events,
            version,
        })
    }

    /// Changes capacity, returning the users promoted into new slots.
    ///
    /// # Errors
    ///
    /// [`SchedulingError::Permission`] for non-admins;
    /// [`SchedulingError::InvalidDefinition`] if the capacity is below 4, outside
    /// the game format's bounds, or below the current participant count.
    pub async fn set_capacity(
        &self,
        actor: UserId,
        id: OccurrenceId,
        capacity: Capacity,
    ) -> Result<Receipt<Vec<UserId>>> {
        self.require_admin(actor, "change capacity").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::SetCapacity { capacity })
            .await?;
        let promoted = promoted_users(&events);
        tracing::info!(occurrence = %id, capacity = capacity.value(), promoted = promoted.len(), "Capacity changed");
        Ok(Receipt {
            outcome: promoted,
            events,
            version,
        })
    }

    /// Edits one occurrence's details, returning the users promoted by a capacity increase.
    ///
    /// Other occurrences of the series keep their details.
    ///
    /// # Errors
    ///
    /// - [`SchedulingError::Permission`] for non-admins
    /// - [`SchedulingError::InvalidDate`] if the date or a time does not parse
    /// - [`SchedulingError::InvalidDefinition`] if the edited definition breaks a
    ///   rule or its capacity is below the current participant count
    pub async fn edit_occurrence(
        &self,
        actor: UserId,
        id: OccurrenceId,
        definition: EventDefinition,
    ) -> Result<Receipt<Vec<UserId>>> {
        self.require_admin(actor, "edit events").await?;
        let (events, version) = self
            .execute(id, |_| OccurrenceCommand::EditDetails {
                definition: Box::new(definition.clone()),
            })
            .await?;
        let promoted = promoted_users(&events);
        tracing::info!(occurrence = %id, changes = events.len(), promoted = promoted.len(), "Occurrence edited");
        Ok(Receipt {
            outcome: promoted,
            events,
            version,
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn require_admin(&self, actor: UserId, operation: &'static str) -> Result<()> {
        if self.identity.is_admin(actor).await {
            Ok(())
        } else {
            tracing::warn!(user = %actor, operation, "Admin operation refused");
            Err(SchedulingError::Permission {
                user: actor,
                operation,
            })
        }
    }

    /// Runs one command as a retried read-modify-write cycle.
    ///
    /// `command` is rebuilt from the freshly loaded occurrence on every attempt.
    async fn execute<F>(&self, id: OccurrenceId, command: F) -> Result<(Vec<OccurrenceEvent>, Version)>
    where
        F: Fn(&Occurrence) -> OccurrenceCommand,
    {
        let outcome = retry_if(
            &self.retry,
            |attempt| {
                let command = &command;
                async move { self.attempt(id, command, attempt).await }
            },
            SchedulingError::is_retryable,
        )
        .await;

        match outcome {
            Err(SchedulingError::Conflict { occurrence, .. }) => Err(SchedulingError::Conflict {
                occurrence,
                attempts: self.retry.max_attempts(),
            }),
            other => other,
        }
    }

    async fn attempt<F>(
        &self,
        id: OccurrenceId,
        command: &F,
        attempt: u32,
    ) -> Result<(Vec<OccurrenceEvent>, Version)>
    where
        F: Fn(&Occurrence) -> OccurrenceCommand,
    {
        let (mut occurrence, loaded) = self.repository.load(id).await?.into_parts();
        let command = command(&occurrence);
        let events = self.reducer.reduce(&mut occurrence, command, &self.environment)?;

        if events.is_empty() {
            tracing::debug!(occurrence = %id, version = %loaded, "Command changed nothing");
            return Ok((Vec::new(), loaded));
        }

        let saved = self.repository.save(occurrence, loaded).await.map_err(|error| {
            tracing::warn!(occurrence = %id, attempt, error = %error, "Save failed");
            SchedulingError::from(error)
        })?;
        Ok((events.into_vec(), saved))
    }
}

fn departure_receipt(
    id: OccurrenceId,
    user: UserId,
    events: Vec<OccurrenceEvent>,
    version: Version,
) -> Result<Receipt<Departure>> {
    let outcome = Departure::from_events(&events).ok_or_else(|| {
        SchedulingError::Persistence(format!("departure of {user} from {id} was not recorded"))
    })?;
    match outcome.promoted {
        Some(promoted) => {
            tracing::info!(occurrence = %id, user = %user, promoted = %promoted, "Left; promoted from waitlist");
        }
        None => tracing::info!(occurrence = %id, user = %user, from = %outcome.from, "Left"),
    }
    Ok(Receipt {
        outcome,
        events,
        version,
    })
}

fn promoted_users(events: &[OccurrenceEvent]) -> Vec<UserId> {
    events
        .iter()
        .filter_map(|event| match event {
            OccurrenceEvent::PromotedFromWaitlist { user, .. } => Some(*user),
            _ => None,
        })
        .collect()
}

fn join_request_of(user: UserId, events: &[OccurrenceEvent]) -> Option<JoinRequest> {
    events.iter().find_map(|event| match event {
        OccurrenceEvent::JoinRequested { user: u, at } if *u == user => Some(JoinRequest {
            user,
            requested_at: *at,
        }),
        _ => None,
    })
}

fn log_admission(id: OccurrenceId, user: UserId, admission: Admission) {
    match admission {
        Admission::Admitted => tracing::info!(occurrence = %id, user = %user, "Participant admitted"),
        Admission::Waitlisted => tracing::info!(occurrence = %id, user = %user, "Occurrence full; waitlisted"),
        Admission::AlreadyAdmitted => tracing::debug!(occurrence = %id, user = %user, "Already admitted"),
    }
}
