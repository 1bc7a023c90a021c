use std::collections::HashMap;

use chrono::{Datelike, NaiveDate, Weekday};
use regex::Regex;
use tracing::debug;
use ulid::Ulid;

use crate::calendar::Week;
use crate::config::PlanConfig;
use crate::limits::MAX_LABEL_LEN;
use crate::model::*;

use super::slot::{ClaimState, SlotSource, VirtualSlot};

/// Where each team normally trains, from its recurring training templates.
#[derive(Debug, Clone, Default)]
pub struct TeamHalls {
    by_team: HashMap<Ulid, Vec<TeamHall>>,
}

#[derive(Debug, Clone, Copy)]
struct TeamHall {
    weekday: Weekday,
    start: Minutes,
    validity: ValidityWindow,
    hall_id: Ulid,
}

impl TeamHalls {
    pub fn from_templates(templates: &[SlotTemplate]) -> Self {
        let mut by_team: HashMap<Ulid, Vec<TeamHall>> = HashMap::new();
        for t in templates {
            if let (Some(team), true, SlotKind::Training) = (t.team_id, t.recurring, t.kind) {
                by_team.entry(team).or_default().push(TeamHall {
                    weekday: t.weekday,
                    start: t.time.start_minutes(),
                    validity: t.validity,
                    hall_id: t.hall_id,
                });
            }
        }
        for entries in by_team.values_mut() {
            entries.sort_by_key(|e| (e.weekday.num_days_from_monday(), e.start));
        }
        Self { by_team }
    }

    /// The team's hall on `date`'s weekday, else the hall of its first training
    /// in the week. Only templates valid on `date` count.
    pub fn resolve(&self, team: Ulid, date: NaiveDate) -> Option<Ulid> {
        let valid: Vec<&TeamHall> = self
            .by_team
            .get(&team)?
            .iter()
            .filter(|e| e.validity.contains(date))
            .collect();
        valid
            .iter()
            .find(|e| e.weekday == date.weekday())
            .or_else(|| valid.first())
            .map(|e| e.hall_id)
    }
}

/// Legacy hall resolution for imported events without explicit hall references.
pub struct HallMatcher {
    patterns: Vec<(Ulid, Regex)>,
    fallback: Vec<Ulid>,
}

impl HallMatcher {
    pub fn new(halls: &[Hall], fallback_prefix: &str) -> Self {
        let prefix = fallback_prefix.to_lowercase();
        let mut patterns = Vec::new();
        let mut fallback = Vec::new();
        for hall in halls {
            let fragments: Vec<String> = std::iter::once(&hall.name)
                .chain(hall.aliases.iter())
                .map(|f| f.trim())
                .filter(|f| !f.is_empty())
                .map(regex::escape)
                .collect();
            if !fragments.is_empty() {
                let source = format!(r"(?i)\b(?:{})\b", fragments.join("|"));
                match Regex::new(&source) {
                    Ok(re) => patterns.push((hall.id, re)),
                    Err(e) => tracing::warn!("hall {} has an unusable name pattern: {e}", hall.id),
                }
            }
            if !prefix.is_empty() && hall.name.to_lowercase().starts_with(&prefix) {
                fallback.push(hall.id);
            }
        }
        Self { patterns, fallback }
    }

    /// Explicit references win; otherwise match title and location against
    /// hall names; otherwise every hall with the fallback prefix.
    pub fn resolve(&self, event: &HallEvent) -> Vec<Ulid> {
        if !event.hall_ids.is_empty() {
            let mut ids = event.hall_ids.clone();
            ids.sort();
            ids.dedup();
            return ids;
        }
        let haystack = match &event.location {
            Some(loc) => format!("{} {}", event.title, loc),
            None => event.title.clone(),
        };
        let matched: Vec<Ulid> = self
            .patterns
            .iter()
            .filter(|(_, re)| re.is_match(&haystack))
            .map(|(id, _)| *id)
            .collect();
        if matched.is_empty() {
            self.fallback.clone()
        } else {
            matched
        }
    }
}

fn clip_label(mut label: String) -> String {
    if let Some((idx, _)) = label.char_indices().nth(MAX_LABEL_LEN) {
        label.truncate(idx);
    }
    label
}

pub fn game_to_virtual(
    game: &Game,
    week: &Week,
    team_halls: &TeamHalls,
    config: &PlanConfig,
) -> Option<VirtualSlot> {
    if !week.contains(game.date) || !game.status.takes_place() {
        return None;
    }
    let Some(kickoff) = game.time else {
        debug!("dropping game {}: no kick-off time", game.id);
        return None;
    };
    let kickoff = minutes_of_day(kickoff);
    let start = kickoff.saturating_sub(config.game_lead_minutes);
    let end = (kickoff + config.game_tail_minutes).min(config.grid.close_minutes());
    let Some(time) = TimeRange::from_minutes(start, end) else {
        debug!("dropping game {}: kick-off outside grid hours", game.id);
        return None;
    };

    let hall_id = if game.is_away() {
        game.team_id
            .and_then(|team| team_halls.resolve(team, game.date))
    } else {
        game.hall_id
    };
    let Some(hall_id) = hall_id else {
        debug!("dropping game {}: no hall to place it in", game.id);
        return None;
    };

    let label = match (&game.kind, &game.opponent) {
        (GameKind::Home, Some(o)) => format!("Home game vs {o}"),
        (GameKind::Away, Some(o)) => format!("Away game at {o}"),
        (GameKind::Home, None) => "Home game".to_string(),
        (GameKind::Away, None) => "Away game".to_string(),
    };

    Some(VirtualSlot {
        source: SlotSource::Game(game.clone()),
        hall_id,
        date: game.date,
        time,
        team_id: game.team_id,
        label: clip_label(label),
        is_away: game.is_away(),
        is_cancelled: false,
        claim_state: ClaimState::Occupied,
    })
}

pub fn training_to_virtual(training: &TrainingInstance, week: &Week) -> Option<VirtualSlot> {
    if !week.contains(training.date) {
        return None;
    }
    let Some(time) = training.start.zip(training.end).and_then(|(s, e)| TimeRange::new(s, e)) else {
        debug!("dropping training {}: missing or inverted times", training.id);
        return None;
    };

    let label = if training.cancelled {
        match training.cancel_reason.as_deref().map(str::trim) {
            Some(reason) if !reason.is_empty() => format!("Cancelled: {reason}"),
            _ => "Cancelled".to_string(),
        }
    } else {
        match &training.coach {
            Some(coach) => format!("Training ({coach})"),
            None => "Training".to_string(),
        }
    };

    Some(VirtualSlot {
        source: SlotSource::Training(training.clone()),
        hall_id: training.hall_id,
        date: training.date,
        time,
        team_id: Some(training.team_id),
        label: clip_label(label),
        is_away: false,
        is_cancelled: training.cancelled,
        claim_state: ClaimState::Occupied,
    })
}

pub fn hall_event_to_virtual(
    event: &HallEvent,
    week: &Week,
    halls: &HallMatcher,
    config: &PlanConfig,
) -> Vec<VirtualSlot> {
    if !week.contains(event.date) {
        return Vec::new();
    }
    let time = if event.all_day {
        config.event_default_window
    } else {
        match event.start.zip(event.end).and_then(|(s, e)| TimeRange::new(s, e)) {
            Some(time) => time,
            None => config.event_default_window,
        }
    };
    let hall_ids = halls.resolve(event);
    if hall_ids.is_empty() {
        debug!("dropping hall event {}: no hall matched", event.id);
    }

    hall_ids
        .into_iter()
        .map(|hall_id| VirtualSlot {
            source: SlotSource::HallEvent(event.clone()),
            hall_id,
            date: event.date,
            time,
            team_id: None,
            label: clip_label(event.title.clone()),
            is_away: false,
            is_cancelled: false,
            claim_state: ClaimState::Occupied,
        })
        .collect()
}

/// Project every dated record of the week onto the grid.
pub fn synthesize(
    templates: &[SlotTemplate],
    trainings: &[TrainingInstance],
    games: &[Game],
    hall_events: &[HallEvent],
    halls: &[Hall],
    week: &Week,
    config: &PlanConfig,
) -> Vec<VirtualSlot> {
    let team_halls = TeamHalls::from_templates(templates);
    let matcher = HallMatcher::new(halls, &config.event_fallback_prefix);

    let mut out: Vec<VirtualSlot> = trainings
        .iter()
        .filter_map(|t| training_to_virtual(t, week))
        .collect();
    out.extend(games.iter().filter_map(|g| game_to_virtual(g, week, &team_halls, config)));
    out.extend(hall_events.iter().flat_map(|e| hall_event_to_virtual(e, week, &matcher, config)));
    out
}
