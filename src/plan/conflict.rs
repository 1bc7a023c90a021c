use std::collections::{HashMap, HashSet};

use chrono::Weekday;
use ulid::Ulid;

use crate::model::*;

use super::error::ValidationError;
use super::slot::{Footprint, GridSlot, SlotKey};

/// Turn form input into a template, or say what is missing.
pub fn validate_template(id: Ulid, draft: &TemplateDraft) -> Result<SlotTemplate, ValidationError> {
    let hall_id = draft.hall_id.ok_or(ValidationError::MissingHall)?;
    let kind = draft.kind.unwrap_or(SlotKind::Training);
    if kind == SlotKind::Training && draft.team_id.is_none() {
        return Err(ValidationError::MissingTeam);
    }
    let weekday = draft.weekday.ok_or(ValidationError::MissingWeekday)?;
    let (Some(start), Some(end)) = (draft.start, draft.end) else {
        return Err(ValidationError::MissingTime);
    };
    let time = TimeRange::new(start, end).ok_or(ValidationError::EndNotAfterStart)?;
    if let (Some(from), Some(until)) = (draft.validity.from, draft.validity.until)
        && until < from {
            return Err(ValidationError::InvertedRange { start: from, end: until });
        }

    Ok(SlotTemplate {
        id,
        hall_id,
        team_id: draft.team_id,
        weekday,
        time,
        kind,
        recurring: draft.recurring,
        validity: draft.validity,
        label: draft.label.clone(),
        notes: draft.notes.clone(),
    })
}

pub(crate) fn footprints_conflict(a: &Footprint, b: &Footprint) -> bool {
    if a.key == b.key || !a.occupies || !b.occupies {
        return false;
    }
    if a.is_virtual && b.is_virtual && a.team_id.is_some() && a.team_id == b.team_id {
        return false;
    }
    a.hall_id == b.hall_id
        && a.weekday == b.weekday
        && a.time.overlaps(&b.time)
        && a.validity.overlaps(&b.validity)
}

pub fn slots_conflict(a: &GridSlot, b: &GridSlot) -> bool {
    footprints_conflict(&a.footprint(), &b.footprint())
}

/// Every slot in `existing` that `candidate` would double-book.
pub fn overlaps<'a>(candidate: &GridSlot, existing: &'a [GridSlot]) -> Vec<&'a GridSlot> {
    let fp = candidate.footprint();
    existing
        .iter()
        .filter(|other| footprints_conflict(&fp, &other.footprint()))
        .collect()
}

/// Template-level check for the administration form: which stored templates
/// would the candidate collide with in any week.
pub fn template_conflicts<'a>(candidate: &SlotTemplate, existing: &'a [SlotTemplate]) -> Vec<&'a SlotTemplate> {
    let fp = Footprint::of_template(candidate);
    existing
        .iter()
        .filter(|other| footprints_conflict(&fp, &Footprint::of_template(other)))
        .collect()
}

/// Keys of all slots with at least one conflict. Pairwise within each
/// (hall, weekday) bucket.
pub fn build_conflict_set(slots: &[GridSlot]) -> HashSet<SlotKey> {
    let mut buckets: HashMap<(Ulid, Weekday), Vec<Footprint>> = HashMap::new();
    for slot in slots {
        let fp = slot.footprint();
        if fp.occupies {
            buckets.entry((fp.hall_id, fp.weekday)).or_default().push(fp);
        }
    }

    let mut conflicting = HashSet::new();
    for bucket in buckets.values() {
        for i in 0..bucket.len() {
            for j in (i + 1)..bucket.len() {
                if footprints_conflict(&bucket[i], &bucket[j]) {
                    conflicting.insert(bucket[i].key);
                    conflicting.insert(bucket[j].key);
                }
            }
        }
    }
    conflicting
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::slot::*;
    use chrono::{Datelike, NaiveDate, NaiveTime};

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn template(hall: Ulid, weekday: Weekday, start: (u32, u32), end: (u32, u32), team: Option<Ulid>) -> SlotTemplate {
        SlotTemplate {
            id: Ulid::new(),
            hall_id: hall,
            team_id: team,
            weekday,
            time: TimeRange::hm(start, end).unwrap(),
            kind: SlotKind::Training,
            recurring: true,
            validity: ValidityWindow::UNBOUNDED,
            label: None,
            notes: None,
        }
    }

    fn recurring(t: SlotTemplate, date: &str) -> GridSlot {
        let date = d(date);
        assert_eq!(date.weekday(), t.weekday);
        GridSlot::Recurring { template: t, date }
    }

    fn home_game(hall: Ulid, team: Ulid, date: &str, start: (u32, u32), end: (u32, u32)) -> GridSlot {
        let game = Game {
            id: Ulid::new(),
            date: d(date),
            time: Some(t(start.0, start.1)),
            kind: GameKind::Home,
            team_id: Some(team),
            hall_id: Some(hall),
            opponent: None,
            status: GameStatus::Scheduled,
        };
        GridSlot::Virtual(VirtualSlot {
            source: SlotSource::Game(game),
            hall_id: hall,
            date: d(date),
            time: TimeRange::hm(start, end).unwrap(),
            team_id: Some(team),
            label: String::new(),
            is_away: false,
            is_cancelled: false,
            claim_state: ClaimState::Occupied,
        })
    }

    fn training(hall: Ulid, team: Ulid, date: &str, start: (u32, u32), end: (u32, u32), cancelled: bool) -> GridSlot {
        let instance = TrainingInstance {
            id: Ulid::new(),
            team_id: team,
            template_id: None,
            date: d(date),
            start: Some(t(start.0, start.1)),
            end: Some(t(end.0, end.1)),
            hall_id: hall,
            coach: None,
            cancelled,
            cancel_reason: None,
        };
        GridSlot::Virtual(VirtualSlot {
            source: SlotSource::Training(instance),
            hall_id: hall,
            date: d(date),
            time: TimeRange::hm(start, end).unwrap(),
            team_id: Some(team),
            label: String::new(),
            is_away: false,
            is_cancelled: cancelled,
            claim_state: ClaimState::Occupied,
        })
    }

    #[test]
    fn overlapping_templates_both_flagged() {
        let h1 = Ulid::new();
        let a = recurring(template(h1, Weekday::Mon, (18, 0), (19, 30), Some(Ulid::new())), "2024-11-04");
        let b = recurring(template(h1, Weekday::Mon, (19, 0), (20, 0), Some(Ulid::new())), "2024-11-04");
        let set = build_conflict_set(&[a.clone(), b.clone()]);
        assert_eq!(set, HashSet::from([a.key(), b.key()]));
    }

    #[test]
    fn adjacent_slots_do_not_conflict() {
        let h1 = Ulid::new();
        let a = recurring(template(h1, Weekday::Mon, (18, 0), (19, 0), None), "2024-11-04");
        let b = recurring(template(h1, Weekday::Mon, (19, 0), (20, 0), None), "2024-11-04");
        assert!(build_conflict_set(&[a, b]).is_empty());
    }

    #[test]
    fn different_hall_or_weekday_never_conflicts() {
        let a = template(Ulid::new(), Weekday::Mon, (18, 0), (20, 0), None);
        let b = template(Ulid::new(), Weekday::Mon, (18, 0), (20, 0), None);
        let c = template(a.hall_id, Weekday::Tue, (18, 0), (20, 0), None);
        assert!(template_conflicts(&a, &[b, c]).is_empty());
    }

    #[test]
    fn disjoint_validity_windows_do_not_conflict() {
        let hall = Ulid::new();
        let mut autumn = template(hall, Weekday::Mon, (18, 0), (20, 0), None);
        autumn.validity = ValidityWindow { from: Some(d("2024-08-01")), until: Some(d("2024-12-31")) };
        let mut spring = template(hall, Weekday::Mon, (18, 0), (20, 0), None);
        spring.validity = ValidityWindow { from: Some(d("2025-01-01")), until: None };
        assert!(template_conflicts(&autumn, std::slice::from_ref(&spring)).is_empty());

        let open = template(hall, Weekday::Mon, (19, 0), (21, 0), None);
        assert_eq!(template_conflicts(&open, &[autumn.clone(), spring.clone()]).len(), 2);
    }

    #[test]
    fn overlap_is_symmetric() {
        let hall = Ulid::new();
        let ranges = [((17, 0), (18, 0)), ((17, 30), (19, 0)), ((18, 0), (18, 30)), ((8, 0), (22, 0))];
        let slots: Vec<GridSlot> = ranges
            .iter()
            .map(|(s, e)| recurring(template(hall, Weekday::Wed, *s, *e, None), "2024-11-06"))
            .collect();
        for a in &slots {
            for b in &slots {
                assert_eq!(slots_conflict(a, b), slots_conflict(b, a));
            }
        }
    }

    #[test]
    fn slot_never_conflicts_with_itself() {
        let a = recurring(template(Ulid::new(), Weekday::Mon, (18, 0), (19, 0), None), "2024-11-04");
        assert!(overlaps(&a, std::slice::from_ref(&a)).is_empty());
    }

    #[test]
    fn same_team_virtuals_are_exempt() {
        let hall = Ulid::new();
        let team = Ulid::new();
        let game = home_game(hall, team, "2024-11-04", (17, 0), (21, 0));
        let train = training(hall, team, "2024-11-04", (18, 0), (19, 30), false);
        assert!(build_conflict_set(&[game.clone(), train]).is_empty());

        let other = training(hall, Ulid::new(), "2024-11-04", (18, 0), (19, 30), false);
        assert_eq!(build_conflict_set(&[game, other]).len(), 2);
    }

    #[test]
    fn same_team_template_and_virtual_still_conflict() {
        let hall = Ulid::new();
        let team = Ulid::new();
        let tmpl = recurring(template(hall, Weekday::Mon, (18, 0), (19, 30), Some(team)), "2024-11-04");
        let game = home_game(hall, team, "2024-11-04", (17, 0), (21, 0));
        assert_eq!(overlaps(&game, std::slice::from_ref(&tmpl)).len(), 1);
    }

    #[test]
    fn cancelled_training_occupies_nothing() {
        let hall = Ulid::new();
        let cancelled = training(hall, Ulid::new(), "2024-11-04", (18, 0), (19, 30), true);
        let tmpl = recurring(template(hall, Weekday::Mon, (18, 0), (19, 30), Some(Ulid::new())), "2024-11-04");
        assert!(build_conflict_set(&[cancelled, tmpl]).is_empty());
    }

    #[test]
    fn overlaps_returns_only_conflicting() {
        let hall = Ulid::new();
        let existing = vec![
            recurring(template(hall, Weekday::Mon, (16, 0), (17, 0), None), "2024-11-04"),
            recurring(template(hall, Weekday::Mon, (18, 0), (19, 0), None), "2024-11-04"),
            recurring(template(hall, Weekday::Mon, (18, 30), (20, 0), None), "2024-11-04"),
        ];
        let candidate = recurring(template(hall, Weekday::Mon, (17, 30), (18, 45), None), "2024-11-04");
        let hits = overlaps(&candidate, &existing);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|s| s.time().start >= t(18, 0)));
    }

    #[test]
    fn validate_template_reports_missing_fields() {
        let draft = TemplateDraft {
            hall_id: Some(Ulid::new()),
            team_id: Some(Ulid::new()),
            weekday: Some(Weekday::Mon),
            start: Some(t(18, 0)),
            end: Some(t(19, 30)),
            kind: Some(SlotKind::Training),
            recurring: true,
            ..Default::default()
        };
        assert!(validate_template(Ulid::new(), &draft).is_ok());

        let no_hall = TemplateDraft { hall_id: None, ..draft.clone() };
        assert_eq!(validate_template(Ulid::new(), &no_hall), Err(ValidationError::MissingHall));

        let no_team = TemplateDraft { team_id: None, ..draft.clone() };
        assert_eq!(validate_template(Ulid::new(), &no_team), Err(ValidationError::MissingTeam));

        let other_kind = TemplateDraft { team_id: None, kind: Some(SlotKind::Event), ..draft.clone() };
        assert!(validate_template(Ulid::new(), &other_kind).is_ok());

        let inverted = TemplateDraft { end: Some(t(18, 0)), ..draft.clone() };
        assert_eq!(validate_template(Ulid::new(), &inverted), Err(ValidationError::EndNotAfterStart));

        let no_time = TemplateDraft { start: None, ..draft.clone() };
        assert_eq!(validate_template(Ulid::new(), &no_time), Err(ValidationError::MissingTime));

        let bad_window = TemplateDraft {
            validity: ValidityWindow { from: Some(d("2025-01-01")), until: Some(d("2024-01-01")) },
            ..draft
        };
        assert!(matches!(
            validate_template(Ulid::new(), &bad_window),
            Err(ValidationError::InvertedRange { .. })
        ));
    }
}
