use std::env;
use tracing::warn;

/// Process-wide scheduling configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// Step between candidate slot starts, in minutes.
    pub slot_granularity_minutes: i64,
    /// Cadence of the dispatch windower.
    pub dispatch_run_interval_minutes: i64,
    /// Half-width W of the dispatch selection window `[now - W, now + W]`.
    pub dispatch_window_half_width_minutes: i64,
    /// A `processing` lease older than this many run intervals is reclaimed.
    pub dispatch_stale_after_runs: i64,
    pub dispatch_max_retries: u32,
    /// Clinic-local offset from UTC, in minutes. All lead-time comparisons
    /// happen in clinic-local time, never server UTC.
    pub clinic_utc_offset_minutes: i64,
}

impl SchedulingConfig {
    pub fn from_env() -> Self {
        let config = Self {
            slot_granularity_minutes: read_i64("SLOT_GRANULARITY_MINUTES", 15),
            dispatch_run_interval_minutes: read_i64("DISPATCH_RUN_INTERVAL_MINUTES", 60),
            dispatch_window_half_width_minutes: read_i64("DISPATCH_WINDOW_HALF_WIDTH_MINUTES", 35),
            dispatch_stale_after_runs: read_i64("DISPATCH_STALE_AFTER_RUNS", 2),
            dispatch_max_retries: read_i64("DISPATCH_MAX_RETRIES", 3) as u32,
            clinic_utc_offset_minutes: read_i64("CLINIC_UTC_OFFSET_MINUTES", 0),
        };

        if 2 * config.dispatch_window_half_width_minutes <= config.dispatch_run_interval_minutes {
            warn!(
                half_width = config.dispatch_window_half_width_minutes,
                run_interval = config.dispatch_run_interval_minutes,
                "dispatch window does not overlap between runs, due messages can be missed"
            );
        }
        if config.slot_granularity_minutes <= 0 {
            warn!("SLOT_GRANULARITY_MINUTES must be positive, falling back to 15");
            return Self {
                slot_granularity_minutes: 15,
                ..config
            };
        }

        config
    }
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: 15,
            dispatch_run_interval_minutes: 60,
            dispatch_window_half_width_minutes: 35,
            dispatch_stale_after_runs: 2,
            dispatch_max_retries: 3,
            clinic_utc_offset_minutes: 0,
        }
    }
}

fn read_i64(key: &str, default: i64) -> i64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} is not a valid integer, using default {}", key, default);
            default
        }),
        Err(_) => default,
    }
}
