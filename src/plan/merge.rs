use std::collections::{HashMap, HashSet};

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;
use ulid::Ulid;

use crate::calendar::Week;
use crate::model::*;

use super::slot::{ClaimState, FreedSlot, GridSlot, SlotSource, SourceKind, VirtualSlot};

fn away_games_in<'a>(games: &'a [Game], week: &'a Week) -> impl Iterator<Item = (&'a Game, Ulid)> + 'a {
    games.iter().filter_map(move |g| {
        let team = g.team_id?;
        (g.is_away() && g.status.takes_place() && week.contains(g.date)).then_some((g, team))
    })
}

/// Recurring training templates an away game of `team` on `date` frees,
/// earliest first.
fn templates_freed_by_away_game<'a>(
    templates: &'a [SlotTemplate],
    team: Ulid,
    date: NaiveDate,
) -> Vec<&'a SlotTemplate> {
    let mut hits: Vec<&SlotTemplate> = templates
        .iter()
        .filter(|t| t.is_training_of(team, date.weekday()) && t.validity.contains(date))
        .collect();
    hits.sort_by_key(|t| (t.time.start, t.id));
    hits
}

/// Template occurrences of the week that a more specific record replaces:
/// any training instance pointing back at the template, or an away game of
/// the template's team on that weekday.
pub fn suppressed_occurrences(
    templates: &[SlotTemplate],
    virtuals: &[VirtualSlot],
    games: &[Game],
    week: &Week,
) -> HashSet<(Ulid, Weekday)> {
    let mut suppressed = HashSet::new();
    for v in virtuals {
        if let SlotSource::Training(training) = &v.source
            && let Some(template_id) = training.template_id {
                suppressed.insert((template_id, training.date.weekday()));
            }
    }
    for (game, team) in away_games_in(games, week) {
        for t in templates_freed_by_away_game(templates, team, game.date) {
            suppressed.insert((t.id, game.date.weekday()));
        }
    }
    suppressed
}

/// Mark virtual slots that vacate a template occurrence as freed, or as
/// claimed when an active claim holds the (template, date) key. Closed halls
/// stay unannotated.
pub fn annotate(
    virtuals: &mut [VirtualSlot],
    templates: &[SlotTemplate],
    claims: &[SlotClaim],
    closures: &[HallClosure],
) {
    let by_id: HashMap<Ulid, &SlotTemplate> = templates.iter().map(|t| (t.id, t)).collect();
    let active: HashMap<(Ulid, NaiveDate), &SlotClaim> = claims
        .iter()
        .filter(|c| c.is_active())
        .map(|c| (c.key(), c))
        .collect();

    // Trainings first, so a cancelled instance owns the key over an away game.
    let mut order: Vec<usize> = (0..virtuals.len()).collect();
    order.sort_by_key(|&i| virtuals[i].source.kind());

    // A training that still takes place keeps its template occurrence occupied.
    let mut taken: HashSet<(Ulid, NaiveDate)> = virtuals
        .iter()
        .filter_map(|v| match &v.source {
            SlotSource::Training(training) if !training.cancelled => {
                training.template_id.map(|id| (id, training.date))
            }
            _ => None,
        })
        .collect();
    for idx in order {
        let v = &mut virtuals[idx];
        let freed = match &v.source {
            SlotSource::Training(training) if training.cancelled => training
                .template_id
                .and_then(|id| by_id.get(&id))
                .map(|t| (*t, FreedReason::CancelledTraining, training.id)),
            SlotSource::Game(game) if game.is_away() => game.team_id.and_then(|team| {
                templates_freed_by_away_game(templates, team, game.date)
                    .into_iter()
                    .find(|t| !taken.contains(&(t.id, game.date)))
                    .map(|t| (t, FreedReason::AwayGame, game.id))
            }),
            _ => None,
        };
        let Some((template, reason, source_id)) = freed else {
            continue;
        };

        let slot = FreedSlot {
            template_id: template.id,
            hall_id: template.hall_id,
            date: v.date,
            time: template.time,
            reason,
            source_id,
        };
        if !taken.insert(slot.key()) {
            continue;
        }
        if closures.iter().any(|c| c.covers(slot.hall_id, slot.date)) {
            debug!("hall {} closed on {}, slot not claimable", slot.hall_id, slot.date);
            continue;
        }
        v.claim_state = match active.get(&slot.key()) {
            Some(claim) => ClaimState::Claimed { slot, claim: (*claim).clone() },
            None => ClaimState::Freed(slot),
        };
    }
}

/// Non-suppressed template occurrences plus the annotated virtual slots.
pub fn merge_visible(
    templates: &[SlotTemplate],
    mut virtuals: Vec<VirtualSlot>,
    claims: &[SlotClaim],
    closures: &[HallClosure],
    games: &[Game],
    week: &Week,
) -> Vec<GridSlot> {
    let suppressed = suppressed_occurrences(templates, &virtuals, games, week);
    annotate(&mut virtuals, templates, claims, closures);

    let mut occurrences: Vec<(&SlotTemplate, NaiveDate)> = templates
        .iter()
        .filter_map(|t| {
            let date = week.date_of(t.weekday);
            (t.is_valid_on(date) && !suppressed.contains(&(t.id, t.weekday))).then_some((t, date))
        })
        .collect();
    occurrences.sort_by_key(|(t, date)| (*date, t.hall_id, t.time.start, t.id));

    virtuals.sort_by_key(|v| (v.date, v.hall_id, v.time.start, v.source.kind(), v.source.id()));

    let mut merged: Vec<GridSlot> = occurrences
        .into_iter()
        .map(|(t, date)| GridSlot::Recurring { template: t.clone(), date })
        .collect();
    merged.extend(virtuals.into_iter().map(GridSlot::Virtual));
    merged
}

/// All freed or claimed slots of a merged week, for the claim picker.
pub fn freed_slots(slots: &[GridSlot]) -> impl Iterator<Item = &VirtualSlot> {
    slots
        .iter()
        .filter_map(GridSlot::as_virtual)
        .filter(|v| v.freed_slot().is_some())
}

/// Sanity helper used in logging: how many slots of each source survived.
pub fn source_counts(slots: &[GridSlot]) -> HashMap<Option<SourceKind>, usize> {
    let mut counts = HashMap::new();
    for slot in slots {
        let kind = slot.as_virtual().map(|v| v.source.kind());
        *counts.entry(kind).or_default() += 1;
    }
    counts
}
