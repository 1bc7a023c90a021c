use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::model::{DateRange, SlotTemplate};

// ── Week / day navigation ────────────────────────────────────────

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    let step = Days::new(days.unsigned_abs());
    let moved = if days >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    };
    moved.unwrap_or(if days >= 0 { NaiveDate::MAX } else { NaiveDate::MIN })
}

pub fn monday_of(date: NaiveDate) -> NaiveDate {
    add_days(date, -i64::from(date.weekday().num_days_from_monday()))
}

pub fn week_days(monday: NaiveDate) -> [NaiveDate; 7] {
    std::array::from_fn(|i| add_days(monday, i as i64))
}

pub fn iso_week_number(date: NaiveDate) -> u32 {
    date.iso_week().week()
}

/// The visible Monday–Sunday week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Week {
    monday: NaiveDate,
}

impl Week {
    pub fn containing(date: NaiveDate) -> Self {
        Self { monday: monday_of(date) }
    }

    pub fn monday(&self) -> NaiveDate {
        self.monday
    }

    pub fn sunday(&self) -> NaiveDate {
        add_days(self.monday, 6)
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.monday, self.sunday())
    }

    pub fn days(&self) -> [NaiveDate; 7] {
        week_days(self.monday)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.range().contains(date)
    }

    pub fn date_of(&self, weekday: Weekday) -> NaiveDate {
        add_days(self.monday, i64::from(weekday.num_days_from_monday()))
    }

    pub fn next(&self) -> Self {
        Self { monday: add_days(self.monday, 7) }
    }

    pub fn prev(&self) -> Self {
        Self { monday: add_days(self.monday, -7) }
    }

    pub fn iso_week(&self) -> u32 {
        iso_week_number(self.monday)
    }
}

// ── Recurring instance generation ────────────────────────────────

/// Every date in `[start, end]` falling on the template's weekday.
pub fn expand(template: &SlotTemplate, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    expand_weekday(template.weekday, start, end)
}

pub fn expand_weekday(weekday: Weekday, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end && cursor.weekday() != weekday {
        cursor = add_days(cursor, 1);
    }
    while cursor <= end {
        dates.push(cursor);
        match cursor.checked_add_days(Days::new(7)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use ulid::Ulid;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn template_on(weekday: Weekday) -> SlotTemplate {
        SlotTemplate {
            id: Ulid::new(),
            hall_id: Ulid::new(),
            team_id: Some(Ulid::new()),
            weekday,
            time: TimeRange::hm((18, 0), (19, 30)).unwrap(),
            kind: SlotKind::Training,
            recurring: true,
            validity: ValidityWindow::UNBOUNDED,
            label: None,
            notes: None,
        }
    }

    #[test]
    fn monday_of_every_weekday() {
        for day in week_days(d("2024-11-04")) {
            assert_eq!(monday_of(day), d("2024-11-04"));
        }
        assert_eq!(monday_of(d("2024-11-11")), d("2024-11-11"));
    }

    #[test]
    fn week_spanning_year_boundary() {
        let week = Week::containing(d("2025-01-01"));
        assert_eq!(week.monday(), d("2024-12-30"));
        assert_eq!(week.sunday(), d("2025-01-05"));
        assert_eq!(week.iso_week(), 1);
        assert_eq!(week.prev().iso_week(), 52);
    }

    #[test]
    fn week_navigation() {
        let week = Week::containing(d("2024-11-06"));
        assert_eq!(week.date_of(Weekday::Mon), d("2024-11-04"));
        assert_eq!(week.date_of(Weekday::Sun), d("2024-11-10"));
        assert_eq!(week.next().monday(), d("2024-11-11"));
        assert_eq!(week.next().prev(), week);
        assert!(week.contains(d("2024-11-10")));
        assert!(!week.contains(d("2024-11-11")));
    }

    #[test]
    fn add_days_negative_and_month_rollover() {
        assert_eq!(add_days(d("2024-03-01"), -1), d("2024-02-29"));
        assert_eq!(add_days(d("2024-11-30"), 1), d("2024-12-01"));
        assert_eq!(add_days(d("2024-11-30"), 0), d("2024-11-30"));
    }

    #[test]
    fn expand_wednesdays_in_november() {
        let dates = expand(&template_on(Weekday::Wed), d("2024-11-01"), d("2024-11-30"));
        assert_eq!(
            dates,
            vec![d("2024-11-06"), d("2024-11-13"), d("2024-11-20"), d("2024-11-27")]
        );
    }

    #[test]
    fn expand_includes_both_bounds() {
        let dates = expand(&template_on(Weekday::Mon), d("2024-11-04"), d("2024-11-18"));
        assert_eq!(dates, vec![d("2024-11-04"), d("2024-11-11"), d("2024-11-18")]);
    }

    #[test]
    fn expand_empty_when_weekday_not_in_range() {
        assert!(expand(&template_on(Weekday::Sun), d("2024-11-04"), d("2024-11-09")).is_empty());
        assert!(expand(&template_on(Weekday::Mon), d("2024-11-10"), d("2024-11-04")).is_empty());
    }

    #[test]
    fn expand_matches_brute_force_over_a_year() {
        let start = d("2024-01-01");
        let end = d("2024-12-31");
        for weekday in [Weekday::Mon, Weekday::Thu, Weekday::Sun] {
            let got = expand_weekday(weekday, start, end);
            let want: Vec<NaiveDate> = start
                .iter_days()
                .take_while(|day| *day <= end)
                .filter(|day| day.weekday() == weekday)
                .collect();
            assert_eq!(got, want);
        }
    }
}
