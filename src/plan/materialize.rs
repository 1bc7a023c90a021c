use std::collections::HashSet;

use chrono::NaiveDate;
use tracing::info;
use ulid::Ulid;

use crate::calendar::expand;
use crate::limits::MAX_EXPAND_DAYS;
use crate::model::*;
use crate::store::RecordStore;

use super::error::{PlanError, ValidationError};

/// Create one training instance per template weekday in `[start, end]`.
/// Dates outside the template's validity window and dates that already have
/// an instance of this template are skipped. Not atomic: on a store error the
/// instances created so far remain.
pub async fn materialize_trainings<S: RecordStore + ?Sized>(
    store: &S,
    template: &SlotTemplate,
    start: NaiveDate,
    end: NaiveDate,
    coach: Option<String>,
) -> Result<Vec<TrainingInstance>, PlanError> {
    if template.kind != SlotKind::Training {
        return Err(ValidationError::NotTraining.into());
    }
    let team_id = template.team_id.ok_or(ValidationError::MissingTeam)?;
    if end < start {
        return Err(ValidationError::InvertedRange { start, end }.into());
    }
    let range = DateRange::new(start, end);
    if range.days() > MAX_EXPAND_DAYS {
        return Err(PlanError::LimitExceeded("date range too wide"));
    }

    let existing: HashSet<NaiveDate> = store
        .trainings(range)
        .await?
        .into_iter()
        .filter(|t| t.template_id == Some(template.id))
        .map(|t| t.date)
        .collect();

    let mut created = Vec::new();
    for date in expand(template, start, end) {
        if !template.validity.contains(date) || existing.contains(&date) {
            continue;
        }
        let instance = TrainingInstance {
            id: Ulid::new(),
            team_id,
            template_id: Some(template.id),
            date,
            start: Some(template.time.start),
            end: Some(template.time.end),
            hall_id: template.hall_id,
            coach: coach.clone(),
            cancelled: false,
            cancel_reason: None,
        };
        created.push(store.create_training(instance).await?);
    }
    info!(
        "materialized {} trainings for template {} between {start} and {end}",
        created.len(),
        template.id
    );
    Ok(created)
}
