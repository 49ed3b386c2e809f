//! Racing writers and flaky storage.

#![allow(clippy::unwrap_used)]

use courtside::repository::RepositoryFuture;
use courtside::{
    Admission, EventDefinition, EventId, InMemoryOccurrenceRepository, Occurrence, OccurrenceId,
    OccurrenceRepository, OccurrenceService, RepositoryError, SchedulingError, StaticDirectory,
    UserId, error::ErrorKind,
};
use courtside_core::retry::RetryPolicy;
use courtside_core::version::{Version, Versioned};
use courtside_testing::test_clock;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy::builder()
        .max_retries(max_retries)
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(2))
        .build()
}

fn service_over(repository: Arc<dyn OccurrenceRepository>, admin: UserId) -> OccurrenceService {
    OccurrenceService::new(
        repository,
        Arc::new(StaticDirectory::new([admin])),
        Arc::new(test_clock()),
    )
    .with_retry_policy(fast_retries(64))
}

async fn schedule(service: &OccurrenceService, admin: UserId, capacity: u32) -> OccurrenceId {
    let definition = EventDefinition::new(admin, "Race Night", "2024-01-01", "18:00", "20:00")
        .with_max_players(capacity);
    service.schedule_event(admin, definition).await.unwrap()[0]
}

// ============================================================================
// Last slot
// ============================================================================

async fn race_for_last_slot(waitlist_open: bool) -> Vec<Result<Admission, SchedulingError>> {
    let admin = UserId::new();
    let service = service_over(Arc::new(InMemoryOccurrenceRepository::new()), admin);
    let id = schedule(&service, admin, 4).await;
    for _ in 0..3 {
        service.attempt_admit(UserId::new(), id).await.unwrap();
    }
    service.set_waitlist_open(admin, id, waitlist_open).await.unwrap();

    let contenders = [UserId::new(), UserId::new()].map(|user| {
        let service = service.clone();
        tokio::spawn(async move { service.attempt_admit(user, id).await.map(|r| r.outcome) })
    });
    let mut outcomes = Vec::new();
    for handle in contenders {
        outcomes.push(handle.await.unwrap());
    }

    let occurrence = service.occurrence(id).await.unwrap();
    assert_eq!(occurrence.participants.len(), 4);
    assert!(occurrence.check_invariants().is_ok());
    outcomes
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_slot_goes_to_one_user_waitlist_open() {
    for _ in 0..25 {
        let outcomes = race_for_last_slot(true).await;
        let admitted = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(Admission::Admitted)))
            .count();
        let waitlisted = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(Admission::Waitlisted)))
            .count();
        assert_eq!((admitted, waitlisted), (1, 1), "{outcomes:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_slot_goes_to_one_user_waitlist_closed() {
    for _ in 0..25 {
        let outcomes = race_for_last_slot(false).await;
        let admitted = outcomes
            .iter()
            .filter(|o| matches!(o, Ok(Admission::Admitted)))
            .count();
        let rejected = outcomes
            .iter()
            .filter(|o| matches!(o, Err(SchedulingError::CapacityExceeded { .. })))
            .count();
        assert_eq!((admitted, rejected), (1, 1), "{outcomes:?}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn crowd_fills_exactly_to_capacity() {
    let admin = UserId::new();
    let service = service_over(Arc::new(InMemoryOccurrenceRepository::new()), admin);
    let id = schedule(&service, admin, 8).await;

    let users: Vec<UserId> = (0..20).map(|_| UserId::new()).collect();
    let handles: Vec<_> = users
        .iter()
        .map(|&user| {
            let service = service.clone();
            tokio::spawn(async move { service.attempt_admit(user, id).await.unwrap().outcome })
        })
        .collect();
    let mut outcomes = Vec::new();
    for handle in handles {
        outcomes.push(handle.await.unwrap());
    }

    assert_eq!(outcomes.iter().filter(|o| **o == Admission::Admitted).count(), 8);
    assert_eq!(outcomes.iter().filter(|o| **o == Admission::Waitlisted).count(), 12);

    let occurrence = service.occurrence(id).await.unwrap();
    let everyone: HashSet<_> = occurrence.participants.iter().chain(&occurrence.waitlist).collect();
    assert_eq!(everyone.len(), 20);
    assert!(occurrence.check_invariants().is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn leave_racing_admit_stays_consistent() {
    let admin = UserId::new();
    let service = service_over(Arc::new(InMemoryOccurrenceRepository::new()), admin);
    let id = schedule(&service, admin, 4).await;
    let mut players = Vec::new();
    for _ in 0..4 {
        let user = UserId::new();
        service.attempt_admit(user, id).await.unwrap();
        players.push(user);
    }

    let leaver = {
        let service = service.clone();
        let user = players[0];
        tokio::spawn(async move { service.attempt_leave(user, id).await.unwrap() })
    };
    let joiner = {
        let service = service.clone();
        tokio::spawn(async move { service.attempt_admit(UserId::new(), id).await.unwrap() })
    };
    leaver.await.unwrap();
    joiner.await.unwrap();

    let occurrence = service.occurrence(id).await.unwrap();
    assert_eq!(occurrence.participants.len(), 4);
    assert!(occurrence.waitlist.is_empty());
    assert!(!occurrence.is_participant(players[0]));
}

// ============================================================================
// Flaky storage
// ============================================================================

/// Fails the next `failures` saves with `error`, then behaves.
struct FlakyRepository {
    inner: InMemoryOccurrenceRepository,
    failures: AtomicU32,
    error: RepositoryError,
    saves: AtomicU32,
}

impl FlakyRepository {
    fn new(failures: u32, error: RepositoryError) -> Self {
        Self {
            inner: InMemoryOccurrenceRepository::new(),
            failures: AtomicU32::new(failures),
            error,
            saves: AtomicU32::new(0),
        }
    }
}

impl OccurrenceRepository for FlakyRepository {
    fn insert(&self, occurrence: Occurrence) -> RepositoryFuture<'_, Version> {
        self.inner.insert(occurrence)
    }

    fn load(&self, id: OccurrenceId) -> RepositoryFuture<'_, Versioned<Occurrence>> {
        self.inner.load(id)
    }

    fn save(&self, occurrence: Occurrence, expected: Version) -> RepositoryFuture<'_, Version> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            let error = self.error.clone();
            return Box::pin(async move { Err(error) });
        }
        self.inner.save(occurrence, expected)
    }

    fn delete(&self, id: OccurrenceId) -> RepositoryFuture<'_, ()> {
        self.inner.delete(id)
    }

    fn list(&self) -> RepositoryFuture<'_, Vec<Occurrence>> {
        self.inner.list()
    }

    fn list_for_event(&self, event: EventId) -> RepositoryFuture<'_, Vec<Occurrence>> {
        self.inner.list_for_event(event)
    }
}

fn conflict() -> RepositoryError {
    RepositoryError::Conflict {
        occurrence: OccurrenceId::new(EventId::new(), 0),
        expected: Version::INITIAL,
        actual: Version::new(1),
    }
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let admin = UserId::new();
    let repository = Arc::new(FlakyRepository::new(2, RepositoryError::Unavailable("timeout".into())));
    let service = service_over(repository.clone(), admin).with_retry_policy(fast_retries(3));
    let id = schedule(&service, admin, 4).await;

    let receipt = service.attempt_admit(UserId::new(), id).await.unwrap();

    assert_eq!(receipt.outcome, Admission::Admitted);
    assert_eq!(repository.saves.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn conflicts_give_up_after_policy_limit() {
    let admin = UserId::new();
    let repository = Arc::new(FlakyRepository::new(u32::MAX, conflict()));
    let service = service_over(repository.clone(), admin).with_retry_policy(fast_retries(3));
    let id = schedule(&service, admin, 4).await;

    let error = service.attempt_admit(UserId::new(), id).await.unwrap_err();

    assert!(matches!(error, SchedulingError::Conflict { attempts: 4, .. }), "{error:?}");
    assert_eq!(repository.saves.load(Ordering::SeqCst), 4);
    assert!(service.occurrence(id).await.unwrap().participants.is_empty());
}

#[tokio::test]
async fn business_errors_are_not_retried() {
    let admin = UserId::new();
    let repository = Arc::new(FlakyRepository::new(0, conflict()));
    let service = service_over(repository.clone(), admin);
    let id = schedule(&service, admin, 4).await;
    service.set_waitlist_open(admin, id, false).await.unwrap();
    for _ in 0..4 {
        service.attempt_admit(UserId::new(), id).await.unwrap();
    }
    let saves = repository.saves.load(Ordering::SeqCst);

    let error = service.attempt_admit(UserId::new(), id).await.unwrap_err();

    assert_eq!(error.kind(), ErrorKind::CapacityExceeded);
    assert_eq!(repository.saves.load(Ordering::SeqCst), saves);
}
