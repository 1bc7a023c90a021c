use std::path::PathBuf;
use std::time::Duration;

use crate::model::{time_from_minutes, Minutes, TimeRange};

/// Vertical extent and resolution of the week grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GridConfig {
    pub open_hour: u32,
    pub close_hour: u32,
    /// Snap step for `offset_to_time`.
    pub resolution_minutes: Minutes,
    /// Render units per hour.
    pub hour_height: f64,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            open_hour: 8,
            close_hour: 22,
            resolution_minutes: 15,
            hour_height: 60.0,
        }
    }
}

impl GridConfig {
    pub fn open_minutes(&self) -> Minutes {
        self.open_hour * 60
    }

    pub fn close_minutes(&self) -> Minutes {
        self.close_hour * 60
    }
}

/// Everything the plan pipeline and the daemon read from the environment.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanConfig {
    pub grid: GridConfig,
    /// Hall occupancy before kick-off.
    pub game_lead_minutes: Minutes,
    /// Hall occupancy after kick-off.
    pub game_tail_minutes: Minutes,
    /// Window for all-day or time-less hall events.
    pub event_default_window: TimeRange,
    /// Halls whose name starts with this receive unmatched legacy hall events.
    pub event_fallback_prefix: String,
    pub debounce: Duration,
    pub metrics_port: Option<u16>,
    pub seed_path: Option<PathBuf>,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            grid: GridConfig::default(),
            game_lead_minutes: 60,
            game_tail_minutes: 180,
            event_default_window: TimeRange {
                start: time_from_minutes(10 * 60),
                end: time_from_minutes(22 * 60),
            },
            event_fallback_prefix: "Halle".into(),
            debounce: Duration::from_millis(300),
            metrics_port: None,
            seed_path: None,
        }
    }
}

impl PlanConfig {
    /// Read `HALLENPLAN_*` variables; anything missing or unparsable keeps its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).map(|s| s.trim().to_string());
        let mut cfg = Self::default();

        if let Some(h) = parse("HALLENPLAN_GRID_OPEN_HOUR").and_then(|s| s.parse().ok()) {
            cfg.grid.open_hour = h;
        }
        if let Some(h) = parse("HALLENPLAN_GRID_CLOSE_HOUR").and_then(|s| s.parse().ok()) {
            cfg.grid.close_hour = h;
        }
        if cfg.grid.close_hour > 24 || cfg.grid.open_hour >= cfg.grid.close_hour {
            tracing::warn!(
                "ignoring grid hours {}..{}, using defaults",
                cfg.grid.open_hour,
                cfg.grid.close_hour
            );
            cfg.grid.open_hour = GridConfig::default().open_hour;
            cfg.grid.close_hour = GridConfig::default().close_hour;
        }
        if let Some(r) = parse("HALLENPLAN_GRID_RESOLUTION_MINUTES")
            .and_then(|s| s.parse::<Minutes>().ok())
            .filter(|r| *r > 0 && *r <= 60)
        {
            cfg.grid.resolution_minutes = r;
        }
        if let Some(h) = parse("HALLENPLAN_GRID_HOUR_HEIGHT")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|h| h.is_finite() && *h > 0.0)
        {
            cfg.grid.hour_height = h;
        }
        if let Some(m) = parse("HALLENPLAN_GAME_LEAD_MINUTES").and_then(|s| s.parse().ok()) {
            cfg.game_lead_minutes = m;
        }
        if let Some(m) = parse("HALLENPLAN_GAME_TAIL_MINUTES").and_then(|s| s.parse().ok()) {
            cfg.game_tail_minutes = m;
        }
        let event_start = parse("HALLENPLAN_EVENT_DEFAULT_START_HOUR").and_then(|s| s.parse::<u32>().ok());
        let event_end = parse("HALLENPLAN_EVENT_DEFAULT_END_HOUR").and_then(|s| s.parse::<u32>().ok());
        if event_start.is_some() || event_end.is_some() {
            let start = event_start.map_or(cfg.event_default_window.start_minutes(), |h| h * 60);
            let end = event_end.map_or(cfg.event_default_window.end_minutes(), |h| h * 60);
            if let Some(window) = TimeRange::from_minutes(start, end) {
                cfg.event_default_window = window;
            }
        }
        if let Some(prefix) = parse("HALLENPLAN_EVENT_FALLBACK_PREFIX") {
            cfg.event_fallback_prefix = prefix;
        }
        if let Some(ms) = parse("HALLENPLAN_DEBOUNCE_MS").and_then(|s| s.parse::<u64>().ok()) {
            cfg.debounce = Duration::from_millis(ms);
        }
        cfg.metrics_port = parse("HALLENPLAN_METRICS_PORT").and_then(|s| s.parse().ok());
        cfg.seed_path = parse("HALLENPLAN_SEED").filter(|s| !s.is_empty()).map(PathBuf::from);
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_env_empty() {
        let cfg = PlanConfig::from_lookup(lookup(&[]));
        assert_eq!(cfg, PlanConfig::default());
        assert_eq!(cfg.grid.open_minutes(), 480);
        assert_eq!(cfg.grid.close_minutes(), 1320);
        assert_eq!(cfg.debounce, Duration::from_millis(300));
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = PlanConfig::from_lookup(lookup(&[
            ("HALLENPLAN_GRID_OPEN_HOUR", "7"),
            ("HALLENPLAN_GRID_CLOSE_HOUR", "23"),
            ("HALLENPLAN_GRID_RESOLUTION_MINUTES", "30"),
            ("HALLENPLAN_DEBOUNCE_MS", "50"),
            ("HALLENPLAN_EVENT_FALLBACK_PREFIX", "KWI"),
            ("HALLENPLAN_METRICS_PORT", "9100"),
            ("HALLENPLAN_EVENT_DEFAULT_START_HOUR", "9"),
        ]));
        assert_eq!(cfg.grid.open_hour, 7);
        assert_eq!(cfg.grid.close_hour, 23);
        assert_eq!(cfg.grid.resolution_minutes, 30);
        assert_eq!(cfg.debounce, Duration::from_millis(50));
        assert_eq!(cfg.event_fallback_prefix, "KWI");
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.event_default_window, TimeRange::hm((9, 0), (22, 0)).unwrap());
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = PlanConfig::from_lookup(lookup(&[
            ("HALLENPLAN_GRID_OPEN_HOUR", "23"),
            ("HALLENPLAN_GRID_CLOSE_HOUR", "8"),
            ("HALLENPLAN_GRID_RESOLUTION_MINUTES", "0"),
            ("HALLENPLAN_GRID_HOUR_HEIGHT", "-3"),
            ("HALLENPLAN_DEBOUNCE_MS", "soon"),
        ]));
        assert_eq!(cfg.grid, GridConfig::default());
        assert_eq!(cfg.debounce, Duration::from_millis(300));
    }
}
