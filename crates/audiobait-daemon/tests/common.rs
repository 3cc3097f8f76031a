#![allow(dead_code)]

use std::path::Path;
use std::sync::{Arc, Mutex};

use audiobait_daemon::audio_sink::AudioSink;
use audiobait_daemon::recorder::AsyncEventSink;
use audiobait_proto::error::{AudiobaitError, AudiobaitResult};
use audiobait_proto::event::PlayEvent;
use audiobait_proto::window::Clock;
use chrono::NaiveDateTime;

/// Ticks in lockstep with tokio's (paused) virtual clock: `now()` is the
/// configured start time plus however far `tokio::time::Instant` has moved
/// since construction. Must be built from inside a running tokio runtime.
pub struct FakeClock {
    base_wall: NaiveDateTime,
    base_instant: tokio::time::Instant,
}

impl FakeClock {
    pub fn at(month: u32, day: u32, h: u32, m: u32, s: u32) -> Arc<Self> {
        let base_wall = chrono::NaiveDate::from_ymd_opt(2026, month, day)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap();
        Arc::new(Self {
            base_wall,
            base_instant: tokio::time::Instant::now(),
        })
    }
}

impl Clock for FakeClock {
    fn now(&self) -> NaiveDateTime {
        let elapsed = tokio::time::Instant::now() - self.base_instant;
        self.base_wall + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Shared handle onto a `RecordingSink`'s log, retained by a test after the
/// sink itself has been moved into a `SchedulePlayer`.
#[derive(Clone)]
pub struct PlaybackLog(Arc<Mutex<Vec<(String, i32, NaiveDateTime)>>>);

impl PlaybackLog {
    pub fn snapshot(&self) -> Vec<(String, i32, NaiveDateTime)> {
        self.0.lock().unwrap().clone()
    }

    pub fn filenames_and_volumes(&self) -> Vec<(String, i32)> {
        self.snapshot().into_iter().map(|(f, v, _)| (f, v)).collect()
    }
}

/// Logs every `(filename, volume, played_at)` it is asked to play, reading
/// `played_at` from the same clock driving the player under test. Fails
/// every call when constructed with `fail=true`.
pub struct RecordingSink {
    clock: Arc<dyn Clock>,
    log: Arc<Mutex<Vec<(String, i32, NaiveDateTime)>>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new(clock: Arc<dyn Clock>, fail: bool) -> Self {
        Self {
            clock,
            log: Arc::new(Mutex::new(Vec::new())),
            fail,
        }
    }

    pub fn handle(&self) -> PlaybackLog {
        PlaybackLog(self.log.clone())
    }
}

#[async_trait::async_trait]
impl AudioSink for RecordingSink {
    async fn play(&self, path: &Path, volume: i32) -> AudiobaitResult<()> {
        if self.fail {
            return Err(AudiobaitError::AudioSink("boom".into()));
        }
        self.log.lock().unwrap().push((
            path.file_name().unwrap().to_string_lossy().into_owned(),
            volume,
            self.clock.now(),
        ));
        Ok(())
    }
}

pub struct CountingEventSink(Mutex<usize>);

impl CountingEventSink {
    pub fn new() -> Self {
        Self(Mutex::new(0))
    }

    pub fn count(&self) -> usize {
        *self.0.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl AsyncEventSink for CountingEventSink {
    async fn add_event(&self, _event: &PlayEvent) -> AudiobaitResult<()> {
        *self.0.lock().unwrap() += 1;
        Ok(())
    }
}
