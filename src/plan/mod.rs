mod claims;
mod conflict;
mod error;
mod grid;
mod materialize;
mod merge;
mod slot;
mod virtual_slot;

pub use claims::{check_claim, claim_freed, claim_slot, release_claim};
pub use conflict::{build_conflict_set, overlaps, slots_conflict, template_conflicts, validate_template};
pub use error::{PlanError, ValidationError};
pub use grid::{
    assign_columns, layout_day, layout_week, offset_to_time, peak_concurrency, time_to_offset, Placement,
};
pub use materialize::materialize_trainings;
pub use merge::{annotate, freed_slots, merge_visible, source_counts, suppressed_occurrences};
pub use slot::{ClaimState, FreedSlot, GridSlot, SlotKey, SlotSource, SourceKind, VirtualSlot};
pub use virtual_slot::{
    game_to_virtual, hall_event_to_virtual, synthesize, training_to_virtual, HallMatcher, TeamHalls,
};

use std::collections::HashSet;

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::calendar::Week;
use crate::config::PlanConfig;
use crate::model::*;

/// Raw records for one visible range, as fetched from the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekData {
    pub halls: Vec<Hall>,
    pub templates: Vec<SlotTemplate>,
    pub trainings: Vec<TrainingInstance>,
    pub games: Vec<Game>,
    pub hall_events: Vec<HallEvent>,
    pub closures: Vec<HallClosure>,
    pub claims: Vec<SlotClaim>,
}

/// Everything the grid needs to draw one week.
#[derive(Debug, Clone)]
pub struct WeekPlan {
    pub week: Week,
    pub slots: Vec<GridSlot>,
    pub conflicts: HashSet<SlotKey>,
    pub placements: Vec<Placement>,
    pub closures: Vec<HallClosure>,
}

impl WeekPlan {
    pub fn slot(&self, key: &SlotKey) -> Option<&GridSlot> {
        self.slots.iter().find(|s| s.key() == *key)
    }

    pub fn placement(&self, key: &SlotKey) -> Option<&Placement> {
        self.placements.iter().find(|p| p.key == *key)
    }

    pub fn is_conflicting(&self, key: &SlotKey) -> bool {
        self.conflicts.contains(key)
    }

    pub fn slots_on(&self, weekday: Weekday) -> impl Iterator<Item = &GridSlot> {
        self.slots.iter().filter(move |s| s.weekday() == weekday)
    }

    pub fn freed(&self) -> impl Iterator<Item = &VirtualSlot> {
        freed_slots(&self.slots)
    }
}

/// Synthesize, merge, detect conflicts, lay out.
pub fn plan_week(data: &WeekData, week: Week, config: &PlanConfig) -> WeekPlan {
    let virtuals = synthesize(
        &data.templates,
        &data.trainings,
        &data.games,
        &data.hall_events,
        &data.halls,
        &week,
        config,
    );
    let slots = merge_visible(
        &data.templates,
        virtuals,
        &data.claims,
        &data.closures,
        &data.games,
        &week,
    );
    let conflicts = build_conflict_set(&slots);
    let placements = layout_week(&slots, &config.grid, true);
    tracing::debug!(
        "planned week {} ({}): {} slots {:?}, {} conflicting",
        week.iso_week(),
        week.monday(),
        slots.len(),
        source_counts(&slots),
        conflicts.len()
    );

    let range = week.range();
    let closures = data
        .closures
        .iter()
        .filter(|c| range.admits_span(c.start_date, c.end_date))
        .cloned()
        .collect();

    WeekPlan { week, slots, conflicts, placements, closures }
}
