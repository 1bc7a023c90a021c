use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::model::*;

/// Which kind of dated record a virtual slot projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Training,
    Game,
    HallEvent,
}

/// The record behind a virtual slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSource {
    Game(Game),
    Training(TrainingInstance),
    HallEvent(HallEvent),
}

impl SlotSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            SlotSource::Game(_) => SourceKind::Game,
            SlotSource::Training(_) => SourceKind::Training,
            SlotSource::HallEvent(_) => SourceKind::HallEvent,
        }
    }

    pub fn id(&self) -> Ulid {
        match self {
            SlotSource::Game(g) => g.id,
            SlotSource::Training(t) => t.id,
            SlotSource::HallEvent(e) => e.id,
        }
    }
}

/// A template occurrence vacated for one date, and everything a claim needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FreedSlot {
    pub template_id: Ulid,
    pub hall_id: Ulid,
    pub date: NaiveDate,
    /// The template's time range, not the source record's.
    pub time: TimeRange,
    pub reason: FreedReason,
    pub source_id: Ulid,
}

impl FreedSlot {
    pub fn key(&self) -> (Ulid, NaiveDate) {
        (self.template_id, self.date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ClaimState {
    #[default]
    Occupied,
    Freed(FreedSlot),
    Claimed { slot: FreedSlot, claim: SlotClaim },
}

/// Week-grid projection of a game, training instance or hall event.
/// Rebuilt on every refresh, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualSlot {
    pub source: SlotSource,
    pub hall_id: Ulid,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub team_id: Option<Ulid>,
    pub label: String,
    pub is_away: bool,
    pub is_cancelled: bool,
    pub claim_state: ClaimState,
}

impl VirtualSlot {
    pub fn key(&self) -> SlotKey {
        SlotKey::Virtual {
            kind: self.source.kind(),
            source_id: self.source.id(),
            hall_id: self.hall_id,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date.weekday()
    }

    /// Cancelled trainings and away games leave their hall empty.
    pub fn occupies_hall(&self) -> bool {
        !self.is_cancelled && !self.is_away
    }

    pub fn is_freed(&self) -> bool {
        matches!(self.claim_state, ClaimState::Freed(_))
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self.claim_state, ClaimState::Claimed { .. })
    }

    pub fn freed_slot(&self) -> Option<&FreedSlot> {
        match &self.claim_state {
            ClaimState::Occupied => None,
            ClaimState::Freed(slot) | ClaimState::Claimed { slot, .. } => Some(slot),
        }
    }

    pub fn claim(&self) -> Option<&SlotClaim> {
        match &self.claim_state {
            ClaimState::Claimed { claim, .. } => Some(claim),
            _ => None,
        }
    }
}

/// Stable identity of a slot within one week plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotKey {
    Template(Ulid),
    /// Hall events may project onto several halls, hence the hall in the key.
    Virtual {
        kind: SourceKind,
        source_id: Ulid,
        hall_id: Ulid,
    },
}

/// One entry of the merged week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridSlot {
    Recurring { template: SlotTemplate, date: NaiveDate },
    Virtual(VirtualSlot),
}

impl GridSlot {
    pub fn key(&self) -> SlotKey {
        match self {
            GridSlot::Recurring { template, .. } => SlotKey::Template(template.id),
            GridSlot::Virtual(v) => v.key(),
        }
    }

    pub fn hall_id(&self) -> Ulid {
        match self {
            GridSlot::Recurring { template, .. } => template.hall_id,
            GridSlot::Virtual(v) => v.hall_id,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            GridSlot::Recurring { date, .. } => *date,
            GridSlot::Virtual(v) => v.date,
        }
    }

    pub fn weekday(&self) -> Weekday {
        self.date().weekday()
    }

    pub fn time(&self) -> TimeRange {
        match self {
            GridSlot::Recurring { template, .. } => template.time,
            GridSlot::Virtual(v) => v.time,
        }
    }

    pub fn team_id(&self) -> Option<Ulid> {
        match self {
            GridSlot::Recurring { template, .. } => template.team_id,
            GridSlot::Virtual(v) => v.team_id,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            GridSlot::Recurring { template, .. } => template.label.as_deref().unwrap_or(""),
            GridSlot::Virtual(v) => &v.label,
        }
    }

    pub fn as_virtual(&self) -> Option<&VirtualSlot> {
        match self {
            GridSlot::Virtual(v) => Some(v),
            GridSlot::Recurring { .. } => None,
        }
    }

    pub(crate) fn footprint(&self) -> Footprint {
        match self {
            GridSlot::Recurring { template, .. } => Footprint::of_template(template),
            GridSlot::Virtual(v) => Footprint {
                key: v.key(),
                hall_id: v.hall_id,
                weekday: v.weekday(),
                time: v.time,
                validity: ValidityWindow::on(v.date),
                team_id: v.team_id,
                is_virtual: true,
                occupies: v.occupies_hall(),
            },
        }
    }
}

/// What conflict detection looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Footprint {
    pub key: SlotKey,
    pub hall_id: Ulid,
    pub weekday: Weekday,
    pub time: TimeRange,
    pub validity: ValidityWindow,
    pub team_id: Option<Ulid>,
    pub is_virtual: bool,
    pub occupies: bool,
}

impl Footprint {
    pub fn of_template(t: &SlotTemplate) -> Self {
        Self {
            key: SlotKey::Template(t.id),
            hall_id: t.hall_id,
            weekday: t.weekday,
            time: t.time,
            validity: t.validity,
            team_id: t.team_id,
            is_virtual: false,
            occupies: true,
        }
    }
}
