use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight. All time arithmetic is done in this unit.
pub type Minutes = u32;

pub const MINUTES_PER_DAY: Minutes = 24 * 60;

pub fn minutes_of_day(t: NaiveTime) -> Minutes {
    t.hour() * 60 + t.minute()
}

/// Inverse of `minutes_of_day`. Values past midnight saturate to 23:59.
pub fn time_from_minutes(m: Minutes) -> NaiveTime {
    let m = m.min(MINUTES_PER_DAY - 1);
    NaiveTime::from_hms_opt(m / 60, m % 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Half-open time-of-day range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeRange {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn from_minutes(start: Minutes, end: Minutes) -> Option<Self> {
        if start >= end || end > MINUTES_PER_DAY {
            return None;
        }
        Self::new(time_from_minutes(start), time_from_minutes(end))
    }

    /// Shorthand for `"HH:MM"` pairs. Used by config defaults and tests.
    pub fn hm(start: (u32, u32), end: (u32, u32)) -> Option<Self> {
        Self::new(
            NaiveTime::from_hms_opt(start.0, start.1, 0)?,
            NaiveTime::from_hms_opt(end.0, end.1, 0)?,
        )
    }

    pub fn start_minutes(&self) -> Minutes {
        minutes_of_day(self.start)
    }

    pub fn end_minutes(&self) -> Minutes {
        minutes_of_day(self.end)
    }

    pub fn duration_minutes(&self) -> Minutes {
        self.end_minutes() - self.start_minutes()
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Validity window of a template. `None` on either side means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidityWindow {
    pub from: Option<NaiveDate>,
    pub until: Option<NaiveDate>,
}

impl ValidityWindow {
    pub const UNBOUNDED: ValidityWindow = ValidityWindow { from: None, until: None };

    pub fn on(date: NaiveDate) -> Self {
        Self { from: Some(date), until: Some(date) }
    }

    fn lower(&self) -> NaiveDate {
        self.from.unwrap_or(NaiveDate::MIN)
    }

    fn upper(&self) -> NaiveDate {
        self.until.unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.lower() <= date && date <= self.upper()
    }

    pub fn overlaps(&self, other: &ValidityWindow) -> bool {
        self.lower() <= other.upper() && other.lower() <= self.upper()
    }
}

/// Inclusive date range. Carries the overlap predicates the record store filters with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        debug_assert!(start <= end, "DateRange start must not be after end");
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// `validFrom <= end AND validUntil >= start`, empty bounds unbounded.
    pub fn admits_validity(&self, window: &ValidityWindow) -> bool {
        window.overlaps(&ValidityWindow { from: Some(self.start), until: Some(self.end) })
    }

    /// `startDate <= end AND endDate >= start`.
    pub fn admits_span(&self, start: NaiveDate, end: NaiveDate) -> bool {
        start <= self.end && end >= self.start
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }
}

// ── Records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hall {
    pub id: Ulid,
    pub name: String,
    /// Name fragments matched against free-text event titles/locations.
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Training,
    Game,
    Event,
    Other,
}

/// A weekly booking rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotTemplate {
    pub id: Ulid,
    pub hall_id: Ulid,
    pub team_id: Option<Ulid>,
    pub weekday: Weekday,
    pub time: TimeRange,
    pub kind: SlotKind,
    pub recurring: bool,
    #[serde(default)]
    pub validity: ValidityWindow,
    pub label: Option<String>,
    pub notes: Option<String>,
}

impl SlotTemplate {
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        date.weekday() == self.weekday && self.validity.contains(date)
    }

    /// A recurring training rule for `team` on `weekday`, i.e. what an away game frees.
    pub fn is_training_of(&self, team: Ulid, weekday: Weekday) -> bool {
        self.recurring
            && self.kind == SlotKind::Training
            && self.team_id == Some(team)
            && self.weekday == weekday
    }
}

/// Unvalidated template input from the administration forms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateDraft {
    pub hall_id: Option<Ulid>,
    pub team_id: Option<Ulid>,
    pub weekday: Option<Weekday>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub kind: Option<SlotKind>,
    pub recurring: bool,
    #[serde(default)]
    pub validity: ValidityWindow,
    pub label: Option<String>,
    pub notes: Option<String>,
}

/// A concrete training on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingInstance {
    pub id: Ulid,
    pub team_id: Ulid,
    /// Template this instance was materialized from, if any.
    pub template_id: Option<Ulid>,
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub hall_id: Ulid,
    pub coach: Option<String>,
    #[serde(default)]
    pub cancelled: bool,
    pub cancel_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Scheduled,
    Played,
    Postponed,
    Cancelled,
}

impl GameStatus {
    /// Postponed and cancelled fixtures take place nowhere on their date.
    pub fn takes_place(&self) -> bool {
        matches!(self, GameStatus::Scheduled | GameStatus::Played)
    }
}

/// Fixture imported from the league feed. Read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: Ulid,
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub kind: GameKind,
    pub team_id: Option<Ulid>,
    /// Set for home games; away games play elsewhere.
    pub hall_id: Option<Ulid>,
    pub opponent: Option<String>,
    #[serde(default)]
    pub status: GameStatus,
}

impl Game {
    pub fn is_away(&self) -> bool {
        self.kind == GameKind::Away
    }
}

/// Calendar entry imported from the hall operator's calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallEvent {
    pub id: Ulid,
    pub title: String,
    pub location: Option<String>,
    pub date: NaiveDate,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    #[serde(default)]
    pub all_day: bool,
    /// Explicit hall references. Empty for legacy imports.
    #[serde(default)]
    pub hall_ids: Vec<Ulid>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HallClosure {
    pub id: Ulid,
    pub hall_id: Ulid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: Option<String>,
    pub source: Option<String>,
}

impl HallClosure {
    pub fn covers(&self, hall_id: Ulid, date: NaiveDate) -> bool {
        self.hall_id == hall_id && self.start_date <= date && date <= self.end_date
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreedReason {
    CancelledTraining,
    AwayGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Active,
    /// Terminal.
    Revoked,
}

/// A team's temporary use of a freed slot on one date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotClaim {
    pub id: Ulid,
    /// Template whose occurrence was freed.
    pub hall_slot: Ulid,
    pub hall_id: Ulid,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub claimed_by_team: Ulid,
    pub claimed_by_member: Ulid,
    pub freed_reason: FreedReason,
    /// Training instance or game that freed the slot.
    pub freed_source_id: Ulid,
    pub status: ClaimStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<Ulid>,
}

impl SlotClaim {
    pub fn is_active(&self) -> bool {
        self.status == ClaimStatus::Active
    }

    pub fn key(&self) -> (Ulid, NaiveDate) {
        (self.hall_slot, self.date)
    }
}

/// Claim as submitted to the store; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClaim {
    pub hall_slot: Ulid,
    pub hall_id: Ulid,
    pub date: NaiveDate,
    pub time: TimeRange,
    pub claimed_by_team: Ulid,
    pub claimed_by_member: Ulid,
    pub freed_reason: FreedReason,
    pub freed_source_id: Ulid,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn time_range_rejects_empty_and_inverted() {
        assert!(TimeRange::hm((18, 0), (18, 0)).is_none());
        assert!(TimeRange::hm((19, 0), (18, 0)).is_none());
        let r = TimeRange::hm((18, 0), (19, 30)).unwrap();
        assert_eq!(r.duration_minutes(), 90);
    }

    #[test]
    fn time_range_overlap_is_half_open() {
        let a = TimeRange::hm((18, 0), (19, 30)).unwrap();
        let b = TimeRange::hm((19, 0), (20, 0)).unwrap();
        let c = TimeRange::hm((19, 30), (21, 0)).unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // adjacent
    }

    #[test]
    fn minutes_roundtrip_and_saturation() {
        let t = NaiveTime::from_hms_opt(21, 45, 0).unwrap();
        assert_eq!(time_from_minutes(minutes_of_day(t)), t);
        assert_eq!(time_from_minutes(MINUTES_PER_DAY + 30), NaiveTime::from_hms_opt(23, 59, 0).unwrap());
        assert!(TimeRange::from_minutes(600, MINUTES_PER_DAY + 1).is_none());
    }

    #[test]
    fn validity_unbounded_sides() {
        let w = ValidityWindow { from: Some(d("2024-09-01")), until: None };
        assert!(!w.contains(d("2024-08-31")));
        assert!(w.contains(d("2030-01-01")));
        assert!(ValidityWindow::UNBOUNDED.contains(d("1999-01-01")));
    }

    #[test]
    fn validity_overlap() {
        let autumn = ValidityWindow { from: Some(d("2024-09-01")), until: Some(d("2024-12-31")) };
        let spring = ValidityWindow { from: Some(d("2025-01-01")), until: Some(d("2025-06-30")) };
        let open = ValidityWindow { from: Some(d("2024-12-31")), until: None };
        assert!(!autumn.overlaps(&spring));
        assert!(autumn.overlaps(&open));
        assert!(spring.overlaps(&open));
        assert!(ValidityWindow::UNBOUNDED.overlaps(&autumn));
    }

    #[test]
    fn date_range_filters() {
        let week = DateRange::new(d("2024-11-04"), d("2024-11-10"));
        assert_eq!(week.days(), 7);
        assert!(week.admits_validity(&ValidityWindow::UNBOUNDED));
        assert!(week.admits_validity(&ValidityWindow { from: None, until: Some(d("2024-11-04")) }));
        assert!(!week.admits_validity(&ValidityWindow { from: Some(d("2024-11-11")), until: None }));
        assert!(week.admits_span(d("2024-10-01"), d("2024-11-04")));
        assert!(!week.admits_span(d("2024-11-11"), d("2024-11-12")));
    }

    #[test]
    fn template_valid_on_checks_weekday_and_window() {
        let t = SlotTemplate {
            id: Ulid::new(),
            hall_id: Ulid::new(),
            team_id: None,
            weekday: Weekday::Mon,
            time: TimeRange::hm((18, 0), (19, 30)).unwrap(),
            kind: SlotKind::Training,
            recurring: true,
            validity: ValidityWindow { from: Some(d("2024-11-01")), until: Some(d("2024-11-30")) },
            label: None,
            notes: None,
        };
        assert!(t.is_valid_on(d("2024-11-04")));
        assert!(!t.is_valid_on(d("2024-11-05")));
        assert!(!t.is_valid_on(d("2024-12-02")));
    }

    #[test]
    fn closure_covers_inclusive_range() {
        let hall = Ulid::new();
        let c = HallClosure {
            id: Ulid::new(),
            hall_id: hall,
            start_date: d("2024-12-23"),
            end_date: d("2025-01-05"),
            reason: Some("Winterpause".into()),
            source: None,
        };
        assert!(c.covers(hall, d("2024-12-23")));
        assert!(c.covers(hall, d("2025-01-05")));
        assert!(!c.covers(hall, d("2025-01-06")));
        assert!(!c.covers(Ulid::new(), d("2024-12-24")));
    }

    #[test]
    fn game_status_occupancy() {
        assert!(GameStatus::Scheduled.takes_place());
        assert!(GameStatus::Played.takes_place());
        assert!(!GameStatus::Postponed.takes_place());
        assert!(!GameStatus::Cancelled.takes_place());
    }

    #[test]
    fn claim_serialization_roundtrip() {
        let claim = SlotClaim {
            id: Ulid::new(),
            hall_slot: Ulid::new(),
            hall_id: Ulid::new(),
            date: d("2024-11-04"),
            time: TimeRange::hm((18, 0), (19, 30)).unwrap(),
            claimed_by_team: Ulid::new(),
            claimed_by_member: Ulid::new(),
            freed_reason: FreedReason::AwayGame,
            freed_source_id: Ulid::new(),
            status: ClaimStatus::Active,
            notes: None,
            created_at: Utc::now(),
            revoked_at: None,
            revoked_by: None,
        };
        let json = serde_json::to_string(&claim).unwrap();
        assert!(json.contains("\"away_game\""));
        let decoded: SlotClaim = serde_json::from_str(&json).unwrap();
        assert_eq!(claim, decoded);
    }
}
