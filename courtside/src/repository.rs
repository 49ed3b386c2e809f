//! Persistence collaborator for occurrences.
//!
//! Stores are versioned: [`OccurrenceRepository::save`] only succeeds when the
//! caller states the version it loaded, which is what makes the service's
//! read-modify-write safe under concurrent access.
//!
//! Methods return boxed futures so the trait stays dyn-compatible and can be
//! shared as `Arc<dyn OccurrenceRepository>`.

use crate::error::{NotFound, SchedulingError};
use crate::types::{EventId, Occurrence, OccurrenceId};
use courtside_core::version::{Version, Versioned};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

/// Boxed future returned by repository methods
pub type RepositoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Errors reported by an occurrence store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// No record under this id
    #[error("occurrence {0} not found")]
    NotFound(OccurrenceId),

    /// The record changed since it was loaded
    #[error("version conflict on {occurrence}: expected {expected}, found {actual}")]
    Conflict {
        /// Record concerned
        occurrence: OccurrenceId,
        /// Version the writer loaded
        expected: Version,
        /// Version currently stored
        actual: Version,
    },

    /// A record with this id already exists
    #[error("occurrence {0} already exists")]
    AlreadyExists(OccurrenceId),

    /// The backend could not be reached or failed transiently
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl From<RepositoryError> for SchedulingError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => Self::NotFound(NotFound::Occurrence(id)),
            RepositoryError::Conflict { occurrence, .. } => Self::Conflict {
                occurrence,
                attempts: 1,
            },
            RepositoryError::AlreadyExists(id) => {
                Self::InvalidDefinition(format!("event {} already scheduled ({id} exists)", id.event))
            }
            RepositoryError::Unavailable(reason) => Self::Persistence(reason),
        }
    }
}

/// Versioned storage of occurrences
pub trait OccurrenceRepository: Send + Sync {
    /// Stores a new occurrence at [`Version::INITIAL`]
    ///
    /// # Errors
    ///
    /// [`RepositoryError::AlreadyExists`] if the id is taken.
    fn insert(&self, occurrence: Occurrence) -> RepositoryFuture<'_, Version>;

    /// Loads an occurrence with its current version
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] if there is no such occurrence.
    fn load(&self, id: OccurrenceId) -> RepositoryFuture<'_, Versioned<Occurrence>>;

    /// Replaces an occurrence if it is still at `expected`, returning the new version
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Conflict`] if someone saved in between,
    /// [`RepositoryError::NotFound`] if the occurrence was deleted.
    fn save(&self, occurrence: Occurrence, expected: Version) -> RepositoryFuture<'_, Version>;

    /// Deletes an occurrence
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] if there is no such occurrence.
    fn delete(&self, id: OccurrenceId) -> RepositoryFuture<'_, ()>;

    /// Every stored occurrence
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list(&self) -> RepositoryFuture<'_, Vec<Occurrence>>;

    /// Occurrences expanded from `event`, in series order
    ///
    /// # Errors
    ///
    /// Backend failures only.
    fn list_for_event(&self, event: EventId) -> RepositoryFuture<'_, Vec<Occurrence>>;
}

/// In-memory occurrence store.
///
/// Cheap to clone; clones share the same records.
#[derive(Clone, Debug, Default)]
pub struct InMemoryOccurrenceRepository {
    records: Arc<RwLock<BTreeMap<OccurrenceId, Versioned<Occurrence>>>>,
}

impl InMemoryOccurrenceRepository {
    /// Creates an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored occurrences
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store is empty
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl OccurrenceRepository for InMemoryOccurrenceRepository {
    fn insert(&self, occurrence: Occurrence) -> RepositoryFuture<'_, Version> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            let id = occurrence.id;
            if records.contains_key(&id) {
                return Err(RepositoryError::AlreadyExists(id));
            }
            records.insert(id, Versioned::new(occurrence, Version::INITIAL));
            Ok(Version::INITIAL)
        })
    }

    fn load(&self, id: OccurrenceId) -> RepositoryFuture<'_, Versioned<Occurrence>> {
        Box::pin(async move {
            self.records
                .read()
                .await
                .get(&id)
                .cloned()
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn save(&self, occurrence: Occurrence, expected: Version) -> RepositoryFuture<'_, Version> {
        Box::pin(async move {
            let mut records = self.records.write().await;
            let id = occurrence.id;
            let current = records.get_mut(&id).ok_or(RepositoryError::NotFound(id))?;
            if current.version != expected {
                return Err(RepositoryError::Conflict {
                    occurrence: id,
                    expected,
                    actual: current.version,
                });
            }
            let version = expected.next();
            *current = Versioned::new(occurrence, version);
            Ok(version)
        })
    }

    fn delete(&self, id: OccurrenceId) -> RepositoryFuture<'_, ()> {
        Box::pin(async move {
            self.records
                .write()
                .await
                .remove(&id)
                .map(|_| ())
                .ok_or(RepositoryError::NotFound(id))
        })
    }

    fn list(&self) -> RepositoryFuture<'_, Vec<Occurrence>> {
        Box::pin(async move {
            Ok(self
                .records
                .read()
                .await
                .values()
                .map(|record| record.value.clone())
                .collect())
        })
    }

    fn list_for_event(&self, event: EventId) -> RepositoryFuture<'_, Vec<Occurrence>> {
        Box::pin(async move {
            let start = OccurrenceId::new(event, 0);
            let end = OccurrenceId::new(event, u32::MAX);
            Ok(self
                .records
                .read()
                .await
                .range(start..=end)
                .map(|(_, record)| record.value.clone())
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::recurrence::{RecurrencePolicy, expand};
    use crate::types::{EventDefinition, UserId};

    fn occurrences(weeks: u32) -> Vec<Occurrence> {
        let definition =
            EventDefinition::new(UserId::new(), "Open Play", "2024-01-01", "18:00", "20:00").recurring(true);
        expand(&definition, RecurrencePolicy::weekly(weeks)).unwrap().collect()
    }

    #[tokio::test]
    async fn save_requires_loaded_version() {
        let repository = InMemoryOccurrenceRepository::new();
        let occurrence = occurrences(1).remove(0);
        let id = occurrence.id;
        repository.insert(occurrence).await.unwrap();

        let loaded = repository.load(id).await.unwrap();
        let (mut first, version) = loaded.clone().into_parts();
        first.participants.push(UserId::new());
        assert_eq!(repository.save(first, version).await.unwrap(), Version::new(1));

        let (stale, stale_version) = loaded.into_parts();
        let error = repository.save(stale, stale_version).await.unwrap_err();
        assert_eq!(
            error,
            RepositoryError::Conflict {
                occurrence: id,
                expected: Version::INITIAL,
                actual: Version::new(1),
            }
        );
        assert_eq!(repository.load(id).await.unwrap().value.participants.len(), 1);
    }

    #[tokio::test]
    async fn insert_twice_fails() {
        let repository = InMemoryOccurrenceRepository::new();
        let occurrence = occurrences(1).remove(0);
        repository.insert(occurrence.clone()).await.unwrap();
        assert!(matches!(
            repository.insert(occurrence).await,
            Err(RepositoryError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn list_for_event_returns_series_in_order() {
        let repository = InMemoryOccurrenceRepository::new();
        let series = occurrences(5);
        let event = series[0].id.event;
        for occurrence in series.into_iter().rev() {
            repository.insert(occurrence).await.unwrap();
        }
        repository.insert(occurrences(1).remove(0)).await.unwrap();

        let listed = repository.list_for_event(event).await.unwrap();
        let sequences: Vec<_> = listed.iter().map(|o| o.id.sequence).collect();
        assert_eq!(sequences, [0, 1, 2, 3, 4]);
        assert_eq!(repository.list().await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn delete_then_load_is_not_found() {
        let repository = InMemoryOccurrenceRepository::new();
        let occurrence = occurrences(1).remove(0);
        let id = occurrence.id;
        repository.insert(occurrence).await.unwrap();
        repository.delete(id).await.unwrap();

        assert_eq!(repository.load(id).await.unwrap_err(), RepositoryError::NotFound(id));
        assert_eq!(repository.delete(id).await.unwrap_err(), RepositoryError::NotFound(id));
        assert!(repository.is_empty().await);
    }

    #[test]
    fn errors_map_onto_taxonomy() {
        let id = OccurrenceId::new(EventId::new(), 0);
        let error: SchedulingError = RepositoryError::Unavailable("down".into()).into();
        assert!(error.is_retryable());
        let error: SchedulingError = RepositoryError::NotFound(id).into();
        assert_eq!(error, SchedulingError::NotFound(NotFound::Occurrence(id)));
    }
}
