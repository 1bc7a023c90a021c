use std::collections::BTreeMap;

use chrono::NaiveTime;
use ulid::Ulid;

use crate::config::GridConfig;
use crate::model::*;

use super::slot::{GridSlot, SlotKey};

// ── Time ↔ grid coordinates ──────────────────────────────────────

/// Vertical position of `time`, measured from the grid's opening hour.
/// Negative before opening.
pub fn time_to_offset(time: NaiveTime, grid: &GridConfig) -> f64 {
    let minutes = f64::from(minutes_of_day(time)) - f64::from(grid.open_minutes());
    minutes / 60.0 * grid.hour_height
}

/// Inverse of `time_to_offset`, snapped to the grid resolution and clamped
/// to opening hours.
pub fn offset_to_time(offset: f64, grid: &GridConfig) -> NaiveTime {
    let open = f64::from(grid.open_minutes());
    let close = f64::from(grid.close_minutes());
    let step = f64::from(grid.resolution_minutes.max(1));
    let raw = if offset.is_finite() {
        open + offset / grid.hour_height * 60.0
    } else {
        open
    };
    let snapped = ((raw / step).round() * step).clamp(open, close);
    time_from_minutes(snapped as Minutes)
}

// ── Interval colouring ───────────────────────────────────────────

/// Greedy first-fit colouring of intervals sorted by start (longer first on
/// ties). Returns the column of each input range and the column count, which
/// equals the peak number of simultaneously running ranges.
pub fn assign_columns(ranges: &[TimeRange]) -> (Vec<usize>, usize) {
    let mut order: Vec<usize> = (0..ranges.len()).collect();
    order.sort_by(|&a, &b| {
        ranges[a]
            .start
            .cmp(&ranges[b].start)
            .then(ranges[b].duration_minutes().cmp(&ranges[a].duration_minutes()))
    });

    let mut columns = vec![0usize; ranges.len()];
    let mut column_ends: Vec<NaiveTime> = Vec::new();
    for idx in order {
        let range = ranges[idx];
        match column_ends.iter().position(|end| *end <= range.start) {
            Some(col) => {
                column_ends[col] = range.end;
                columns[idx] = col;
            }
            None => {
                columns[idx] = column_ends.len();
                column_ends.push(range.end);
            }
        }
    }
    (columns, column_ends.len())
}

/// Sweep line: maximum number of ranges active at the same instant.
pub fn peak_concurrency(ranges: &[TimeRange]) -> usize {
    let mut events: Vec<(Minutes, i32)> = Vec::with_capacity(ranges.len() * 2);
    for r in ranges {
        events.push((r.start_minutes(), 1));
        events.push((r.end_minutes(), -1));
    }
    // Ends sort before starts at the same minute (half-open ranges).
    events.sort();

    let mut active: i32 = 0;
    let mut peak: i32 = 0;
    for (_, delta) in events {
        active += delta;
        peak = peak.max(active);
    }
    peak as usize
}

/// Render position of one slot within its day (or day/hall) column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub key: SlotKey,
    pub column: usize,
    pub columns: usize,
    /// Horizontal start as a fraction of the column width.
    pub left: f64,
    /// Width as a fraction of the column width.
    pub width: f64,
    pub top: f64,
    pub height: f64,
}

/// Lay out slots that share one day column.
pub fn layout_day(slots: &[&GridSlot], grid: &GridConfig) -> Vec<Placement> {
    let ranges: Vec<TimeRange> = slots.iter().map(|s| s.time()).collect();
    let (columns, total) = assign_columns(&ranges);
    debug_assert_eq!(total, peak_concurrency(&ranges));

    slots
        .iter()
        .zip(columns)
        .map(|(slot, column)| {
            let time = slot.time();
            let top = time_to_offset(time.start, grid);
            Placement {
                key: slot.key(),
                column,
                columns: total,
                left: column as f64 / total as f64,
                width: 1.0 / total as f64,
                top,
                height: time_to_offset(time.end, grid) - top,
            }
        })
        .collect()
}

/// Lay out a whole week: one column group per weekday, or per weekday and
/// hall when `per_hall` is set.
pub fn layout_week(slots: &[GridSlot], grid: &GridConfig, per_hall: bool) -> Vec<Placement> {
    let mut groups: BTreeMap<(u32, Option<Ulid>), Vec<&GridSlot>> = BTreeMap::new();
    for slot in slots {
        let day = slot.weekday().num_days_from_monday();
        let hall = per_hall.then(|| slot.hall_id());
        groups.entry((day, hall)).or_default().push(slot);
    }
    groups
        .values()
        .flat_map(|group| layout_day(group, grid))
        .collect()
}
