mod memory;

pub use memory::{MemoryStore, Snapshot, SnapshotError};

use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;
use tokio::sync::broadcast;
use ulid::Ulid;

use crate::model::*;
use crate::notify::{ChangeEvent, Collection};
use crate::plan::WeekData;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("record not found: {0}")]
    NotFound(Ulid),
    /// The active-claim uniqueness constraint on (hall_slot, date) rejected a write.
    #[error("unique constraint violated: active claim exists for {hall_slot} on {date}")]
    UniqueViolation { hall_slot: Ulid, date: NaiveDate },
    #[error("claim {0} is not active")]
    NotActive(Ulid),
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}

/// Read/write access to the collaborator record store.
///
/// Range queries use overlap semantics: templates by validity window, closures
/// by their date span, everything else by its single date.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn halls(&self) -> Result<Vec<Hall>, StoreError>;
    async fn templates(&self, range: DateRange) -> Result<Vec<SlotTemplate>, StoreError>;
    async fn trainings(&self, range: DateRange) -> Result<Vec<TrainingInstance>, StoreError>;
    async fn games(&self, range: DateRange) -> Result<Vec<Game>, StoreError>;
    async fn hall_events(&self, range: DateRange) -> Result<Vec<HallEvent>, StoreError>;
    async fn closures(&self, range: DateRange) -> Result<Vec<HallClosure>, StoreError>;
    /// Claims of any status dated inside `range`.
    async fn claims(&self, range: DateRange) -> Result<Vec<SlotClaim>, StoreError>;

    async fn create_training(&self, training: TrainingInstance) -> Result<TrainingInstance, StoreError>;
    async fn update_training(&self, training: TrainingInstance) -> Result<TrainingInstance, StoreError>;
    async fn delete_training(&self, id: Ulid) -> Result<(), StoreError>;

    /// Must reject a second active claim for the same (hall_slot, date) with
    /// `StoreError::UniqueViolation`, atomically with respect to concurrent callers.
    async fn create_claim(&self, claim: NewClaim) -> Result<SlotClaim, StoreError>;
    async fn get_claim(&self, id: Ulid) -> Result<SlotClaim, StoreError>;
    async fn revoke_claim(&self, id: Ulid, revoked_by: Ulid) -> Result<SlotClaim, StoreError>;

    fn subscribe(&self, collection: Collection) -> broadcast::Receiver<ChangeEvent>;
}

/// Fetch everything the plan pipeline needs for `range`, queries in parallel.
pub async fn load_week<S: RecordStore + ?Sized>(store: &S, range: DateRange) -> Result<WeekData, StoreError> {
    let (halls, templates, trainings, games, hall_events, closures, claims) = tokio::try_join!(
        store.halls(),
        store.templates(range),
        store.trainings(range),
        store.games(range),
        store.hall_events(range),
        store.closures(range),
        store.claims(range),
    )?;
    Ok(WeekData { halls, templates, trainings, games, hall_events, closures, claims })
}
