use chrono::NaiveDate;
use thiserror::Error;
use ulid::Ulid;

use crate::store::StoreError;

/// Input rejected before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("hall is required")]
    MissingHall,
    #[error("team is required for training slots")]
    MissingTeam,
    #[error("weekday is required")]
    MissingWeekday,
    #[error("start and end time are required")]
    MissingTime,
    #[error("end time must be after start time")]
    EndNotAfterStart,
    #[error("only training templates can be materialized")]
    NotTraining,
    #[error("range end {end} is before start {start}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),
    #[error("slot already claimed: {hall_slot} on {date}")]
    AlreadyClaimed { hall_slot: Ulid, date: NaiveDate },
    #[error("slot is not free to claim")]
    NotFreed,
    #[error("cannot claim a slot in the past ({0})")]
    PastDate(NaiveDate),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("not found: {0}")]
    NotFound(Ulid),
    #[error("claim {0} is already revoked")]
    AlreadyRevoked(Ulid),
    #[error("limit exceeded: {0}")]
    LimitExceeded(&'static str),
    #[error("record store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for PlanError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { hall_slot, date } => {
                PlanError::AlreadyClaimed { hall_slot, date }
            }
            StoreError::NotFound(id) => PlanError::NotFound(id),
            StoreError::NotActive(id) => PlanError::AlreadyRevoked(id),
            other => PlanError::Store(other),
        }
    }
}

impl PlanError {
    /// Lost a claim race; callers show "already taken" instead of the raw error.
    pub fn is_already_claimed(&self) -> bool {
        matches!(self, PlanError::AlreadyClaimed { .. })
    }
}
