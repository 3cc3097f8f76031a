//! `[from, until)` daily time windows, with optional midnight wrap, evaluated
//! against an injectable clock so the playback engine can be driven by a
//! fake clock in tests.

use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime, Timelike};

use crate::time_of_day::TimeOfDay;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Source of "now" for the playback engine. `SystemClock` drives production;
/// tests supply a fake that advances under their own control.
pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

fn time_of_day_seconds(dt: &NaiveDateTime) -> i64 {
    dt.hour() as i64 * 3600 + dt.minute() as i64 * 60 + dt.second() as i64
}

/// Forward distance in seconds from `now_secs` to the next occurrence of
/// `target_secs` on a 24h wheel (`0` if they coincide).
fn seconds_forward(now_secs: i64, target_secs: i64) -> i64 {
    let diff = target_secs - now_secs;
    if diff >= 0 {
        diff
    } else {
        diff + SECONDS_PER_DAY
    }
}

pub struct Window {
    pub from: TimeOfDay,
    pub until: TimeOfDay,
    clock: Arc<dyn Clock>,
}

impl Window {
    pub fn new(from: TimeOfDay, until: TimeOfDay, clock: Arc<dyn Clock>) -> Self {
        Self { from, until, clock }
    }

    fn wraps(&self) -> bool {
        self.until.seconds_since_midnight() < self.from.seconds_since_midnight()
    }

    /// Length of the window in seconds, accounting for midnight wrap.
    fn window_len(&self) -> i64 {
        let from = self.from.seconds_since_midnight();
        let until = self.until.seconds_since_midnight();
        if self.wraps() {
            (SECONDS_PER_DAY - from) + until
        } else {
            until - from
        }
    }

    /// Seconds elapsed since the most recent `from`, modulo one day. Values
    /// in `[0, window_len())` mean "now" is inside the window.
    fn elapsed_since_from(&self, now_secs: i64) -> i64 {
        let from = self.from.seconds_since_midnight();
        (now_secs - from).rem_euclid(SECONDS_PER_DAY)
    }

    pub fn is_inside(&self, now_secs: i64) -> bool {
        self.elapsed_since_from(now_secs) < self.window_len()
    }

    /// Duration until the window next opens; zero if already inside.
    pub fn until(&self) -> Duration {
        let now_secs = time_of_day_seconds(&self.clock.now());
        if self.is_inside(now_secs) {
            return Duration::zero();
        }
        let from = self.from.seconds_since_midnight();
        Duration::seconds(seconds_forward(now_secs, from))
    }

    /// Duration until the next `from + k*every` strictly after now that
    /// still falls inside the window; negative if no further interval fits
    /// before the window closes.
    pub fn until_next_interval(&self, every: i64) -> Duration {
        let every = every.max(1);
        let now_secs = time_of_day_seconds(&self.clock.now());
        let elapsed = self.elapsed_since_from(now_secs);
        let window_len = self.window_len();
        let k = elapsed.div_euclid(every) + 1;
        let candidate = k * every;
        if candidate < window_len {
            Duration::seconds(candidate - elapsed)
        } else {
            Duration::seconds(window_len - candidate)
        }
    }

    /// Duration until the window next closes.
    pub fn until_end(&self) -> Duration {
        let now_secs = time_of_day_seconds(&self.clock.now());
        let elapsed = self.elapsed_since_from(now_secs);
        let window_len = self.window_len();
        let mut remaining = window_len - elapsed;
        if remaining <= 0 {
            remaining += SECONDS_PER_DAY;
        }
        Duration::seconds(remaining)
    }
}
