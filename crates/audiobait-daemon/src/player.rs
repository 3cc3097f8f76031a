//! The schedule interpretation and playback engine: day-cycle gating,
//! next-combo selection, the window-aware burst loop, and event emission.

use std::path::PathBuf;
use std::sync::Arc;

use audiobait_proto::file_library::FileLibrary;
use audiobait_proto::event::PlayEvent;
use audiobait_proto::schedule::{Combo, Schedule};
use audiobait_proto::sound_chooser::SoundChooser;
use audiobait_proto::window::{Clock, Window};
use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::audio_sink::AudioSink;
use crate::recorder::{AsyncEventSink, EventRecorder};

/// Fuzz tolerance for "we just entered the window" detection (§4.1, §9 —
/// pinned to 3s; the alternative 0s treatment found elsewhere was rejected).
const ENTER_WINDOW_FUZZ: Duration = Duration::seconds(3);

pub struct SchedulePlayer<C: Clock + 'static, S: AudioSink, E: AsyncEventSink> {
    clock: Arc<C>,
    sink: S,
    recorder: EventRecorder<E>,
    library: FileLibrary,
    audio_dir: PathBuf,
    /// Shared with the RPC service: exactly one playback, scheduled or
    /// on-demand, proceeds at a time against the non-reentrant audio sink.
    playback_lock: Arc<Mutex<()>>,
}

impl<C: Clock + 'static, S: AudioSink, E: AsyncEventSink> SchedulePlayer<C, S, E> {
    pub fn new(
        clock: Arc<C>,
        sink: S,
        recorder: EventRecorder<E>,
        audio_dir: PathBuf,
        playback_lock: Arc<Mutex<()>>,
    ) -> Self {
        let library = FileLibrary::open(&audio_dir);
        Self {
            clock,
            sink,
            recorder,
            library,
            audio_dir,
            playback_lock,
        }
    }

    pub fn reload_library(&mut self) {
        self.library = FileLibrary::open(&self.audio_dir);
    }

    fn now(&self) -> chrono::NaiveDateTime {
        self.clock.now()
    }

    /// `today 12:00` if now is before it, else `tomorrow 12:00`.
    pub fn next_day_start(&self) -> chrono::NaiveDateTime {
        let now = self.now();
        let today_noon = chrono::NaiveDate::from_ymd_opt(now.year(), now.month(), now.day())
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        if now < today_noon {
            today_noon
        } else {
            today_noon + Duration::days(1)
        }
    }

    /// §4.6 day-cycle gating: is today a play day under the schedule's
    /// control/play-night cycle?
    pub fn is_sound_playing_day(&self, schedule: &Schedule) -> bool {
        if schedule.control_nights <= 0 {
            return true;
        }
        let first_day = schedule.start_day.max(1);
        let boundary = self.next_day_start() - Duration::hours(24);
        let day_of_month = boundary.day() as i64;
        let cycle = schedule.cycle_length();
        let day = (day_of_month - first_day).rem_euclid(cycle);
        day < schedule.play_nights
    }

    fn window_for(&self, combo: &Combo) -> Window {
        Window::new(combo.from, combo.until, self.clock.clone())
    }

    /// Index of the combo whose window opens soonest; ties favour the
    /// earliest index. Bounded above by 24h, per spec.
    pub fn find_next_combo(&self, combos: &[Combo]) -> Option<usize> {
        if combos.is_empty() {
            return None;
        }
        let mut best: Option<(usize, Duration)> = None;
        let upper_bound = Duration::hours(24);
        for (i, combo) in combos.iter().enumerate() {
            let until = self.window_for(combo).until().min(upper_bound);
            match best {
                Some((_, best_until)) if until >= best_until => {}
                _ => best = Some((i, until)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Duration until the soonest combo's window opens, for the main loop's
    /// `playTime` wait (§4.9). `None` when the schedule has no combos at all.
    pub fn until_next_combo(&self, combos: &[Combo]) -> Option<Duration> {
        let i = self.find_next_combo(combos)?;
        Some(self.window_for(&combos[i]).until())
    }

    /// Runs one full audiobait day: gate check, then the combo loop until
    /// the next day boundary.
    pub async fn play_todays_schedule(&mut self, schedule: &Schedule) {
        let tomorrow = self.next_day_start();
        if !self.is_sound_playing_day(schedule) {
            info!("today is a control (silent) day; waiting for next audiobait day");
            self.sleep_until(tomorrow).await;
            return;
        }
        self.play_todays_combos(&schedule.combos, tomorrow).await;
        self.sleep_until(tomorrow).await;
    }

    async fn play_todays_combos(&mut self, combos: &[Combo], tomorrow: chrono::NaiveDateTime) {
        let Some(mut i) = self.find_next_combo(combos) else {
            return;
        };
        loop {
            let until = self.window_for(&combos[i]).until();
            let next_start = self.now() + until;
            if next_start >= tomorrow {
                break;
            }
            self.play_combo(&combos[i]).await;
            i = (i + 1) % combos.len();
        }
    }

    /// Runs one combo to completion: initial wait-or-immediate-burst, then
    /// the cadence loop until the window closes.
    pub async fn play_combo(&mut self, combo: &Combo) {
        let win = self.window_for(combo);
        let every = combo.every_seconds();
        let all_sounds = self.library.sorted_entries();
        let mut chooser = SoundChooser::new_with_wallclock_seed(all_sounds);

        let to_window = win.until();
        if to_window > Duration::zero() {
            self.sleep(to_window).await;
            self.play_burst(combo, &mut chooser).await;
        } else {
            let next = win.until_next_interval(every);
            if next > Duration::seconds(every) - ENTER_WINDOW_FUZZ {
                self.play_burst(combo, &mut chooser).await;
            }
        }

        loop {
            let next = win.until_next_interval(every);
            if next >= Duration::zero() {
                self.sleep(next).await;
                self.play_burst(combo, &mut chooser).await;
            } else {
                self.sleep(win.until_end()).await;
                return;
            }
        }
    }

    /// One pass through the combo's sound list at the current firing time.
    async fn play_burst(&mut self, combo: &Combo, chooser: &mut SoundChooser) {
        for k in 0..combo.sounds.len() {
            let wait_secs = combo.waits.get(k).copied().unwrap_or(0);
            if wait_secs > 0 {
                self.sleep(Duration::seconds(wait_secs)).await;
            }

            let (id, filename) = chooser.choose(&combo.sounds[k]);
            if id == 0 {
                debug!(token = %combo.sounds[k], "sound token resolved to nothing; skipping");
                continue;
            }

            let t = chrono::Utc::now();
            let path = self.audio_dir.join(&filename);
            let volume = combo.volumes.get(k).copied().unwrap_or(0);

            let result = {
                let _guard = self.playback_lock.lock().await;
                self.sink.play(&path, volume).await
            };
            match result {
                Ok(()) => {
                    let event = PlayEvent::new(t, id, volume);
                    self.recorder.record(event).await;
                }
                Err(err) => {
                    warn!(error = %err, path = %path.display(), "audio sink failed; skipping event");
                }
            }
        }
    }

    async fn sleep(&self, d: Duration) {
        if d <= Duration::zero() {
            return;
        }
        tokio::time::sleep(d.to_std().unwrap_or(std::time::Duration::ZERO)).await;
    }

    async fn sleep_until(&self, target: chrono::NaiveDateTime) {
        let now = self.now();
        if target > now {
            self.sleep(target - now).await;
        }
    }
}

/// Wall-clock timestamp for a `PlayEvent`, independent of the test clock
/// driving scheduling decisions.
pub fn play_event_timestamp() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_sink::AudioSink;
    use audiobait_proto::error::AudiobaitResult;
    use audiobait_proto::time_of_day::TimeOfDay;
    use std::cell::{Cell, RefCell};
    use std::path::Path;
    use std::sync::Mutex as StdMutex;

    struct FakeClock(StdMutex<chrono::NaiveDateTime>);

    impl FakeClock {
        fn at(month: u32, day: u32, h: u32, m: u32, s: u32) -> Arc<Self> {
            let dt = chrono::NaiveDate::from_ymd_opt(2026, month, day)
                .unwrap()
                .and_hms_opt(h, m, s)
                .unwrap();
            Arc::new(Self(StdMutex::new(dt)))
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> chrono::NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    struct RecordingSink {
        log: StdMutex<RefCell<Vec<(String, i32)>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn new(fail: bool) -> Self {
            Self {
                log: StdMutex::new(RefCell::new(Vec::new())),
                fail,
            }
        }
    }

    #[async_trait::async_trait]
    impl AudioSink for RecordingSink {
        async fn play(&self, path: &Path, volume: i32) -> AudiobaitResult<()> {
            if self.fail {
                return Err(audiobait_proto::AudiobaitError::AudioSink("boom".into()));
            }
            self.log
                .lock()
                .unwrap()
                .borrow_mut()
                .push((path.file_name().unwrap().to_string_lossy().into_owned(), volume));
            Ok(())
        }
    }

    struct NullEventSink(StdMutex<Cell<usize>>);

    impl NullEventSink {
        fn new() -> Self {
            Self(StdMutex::new(Cell::new(0)))
        }
        fn count(&self) -> usize {
            self.0.lock().unwrap().get()
        }
    }

    #[async_trait::async_trait]
    impl AsyncEventSink for NullEventSink {
        async fn add_event(&self, _event: &PlayEvent) -> AudiobaitResult<()> {
            let cell = self.0.lock().unwrap();
            cell.set(cell.get() + 1);
            Ok(())
        }
    }

    fn gate_schedule(control_nights: i64, play_nights: i64, start_day: i64) -> Schedule {
        Schedule {
            description: String::new(),
            control_nights,
            play_nights,
            start_day,
            combos: vec![],
            all_sounds: vec![],
        }
    }

    #[test]
    fn zero_control_nights_always_plays() {
        let clock = FakeClock::at(4, 10, 13, 0, 0);
        let sink = RecordingSink::new(false);
        let recorder = EventRecorder::new(NullEventSink::new());
        let player = SchedulePlayer::new(clock, sink, recorder, PathBuf::from("/tmp"), Arc::new(Mutex::new(())));
        let schedule = gate_schedule(0, 0, 1);
        assert!(player.is_sound_playing_day(&schedule));
    }

    #[test]
    fn control_day_gating_matches_s5_scenario() {
        // control_nights=5, play_nights=2, start_day=3: Apr 1-2 silent,
        // 3-4 play, 5-9 silent, 10-11 play, ..., 17 play.
        let expectations = [
            (1, false),
            (2, false),
            (3, true),
            (4, true),
            (5, false),
            (9, false),
            (10, true),
            (11, true),
            (12, false),
            (17, true),
        ];
        let schedule = gate_schedule(5, 2, 3);
        for (day, expect_play) in expectations {
            let clock = FakeClock::at(4, day, 13, 0, 0);
            let sink = RecordingSink::new(false);
            let recorder = EventRecorder::new(NullEventSink::new());
            let player = SchedulePlayer::new(clock, sink, recorder, PathBuf::from("/tmp"), Arc::new(Mutex::new(())));
            assert_eq!(
                player.is_sound_playing_day(&schedule),
                expect_play,
                "day {day} mismatch"
            );
        }
    }

    #[test]
    fn find_next_combo_picks_the_soonest_window() {
        let clock = FakeClock::at(4, 1, 18, 30, 0);
        let sink = RecordingSink::new(false);
        let recorder = EventRecorder::new(NullEventSink::new());
        let player = SchedulePlayer::new(clock, sink, recorder, PathBuf::from("/tmp"), Arc::new(Mutex::new(())));

        let combos = vec![
            Combo {
                from: TimeOfDay::new(19, 0).unwrap(),
                until: TimeOfDay::new(19, 25).unwrap(),
                every: 1800,
                waits: vec![0],
                volumes: vec![10],
                sounds: vec!["1".into()],
                trigger: None,
            },
            Combo {
                from: TimeOfDay::new(11, 12).unwrap(),
                until: TimeOfDay::new(12, 40).unwrap(),
                every: 3600,
                waits: vec![0],
                volumes: vec![10],
                sounds: vec!["2".into()],
                trigger: None,
            },
        ];
        // at 18:30, combo[0] opens in 30min, combo[1] opens next day ~16h42m away.
        assert_eq!(player.find_next_combo(&combos), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn burst_plays_roar_then_same_then_meow() {
        let clock = FakeClock::at(4, 1, 18, 0, 0);
        let sink = RecordingSink::new(false);
        let recorder = EventRecorder::new(NullEventSink::new());
        let mut player = SchedulePlayer::new(clock, sink, recorder, PathBuf::from("/tmp"), Arc::new(Mutex::new(())));

        let combo = Combo {
            from: TimeOfDay::new(18, 0).unwrap(),
            until: TimeOfDay::new(18, 55).unwrap(),
            every: 1800,
            waits: vec![0, 3, 2],
            volumes: vec![10, 10, 10],
            sounds: vec!["11".into(), "same".into(), "12".into()],
            trigger: None,
        };
        let mut chooser = SoundChooser::new(
            vec![(11, "roar.wav".into()), (12, "meow.wav".into())],
            1,
        );
        player.play_burst(&combo, &mut chooser).await;

        let played = player.sink.log.lock().unwrap().borrow().clone();
        assert_eq!(
            played,
            vec![
                ("roar.wav".to_string(), 10),
                ("roar.wav".to_string(), 10), // "same" repeats the previous roar
                ("meow.wav".to_string(), 10),
            ]
        );
    }

    #[tokio::test]
    async fn sink_failure_suppresses_event_emission() {
        let clock = FakeClock::at(4, 1, 12, 0, 0);
        let sink = RecordingSink::new(true);
        let event_sink = Arc::new(NullEventSink::new());
        let recorder = EventRecorder::new_shared(event_sink.clone());
        let mut player = SchedulePlayer::new(clock, sink, recorder, PathBuf::from("/tmp"), Arc::new(Mutex::new(())));

        let combo = Combo {
            from: TimeOfDay::new(12, 1).unwrap(),
            until: TimeOfDay::new(13, 3).unwrap(),
            every: 1800,
            waits: vec![0],
            volumes: vec![10],
            sounds: vec!["1".into()],
            trigger: None,
        };
        let mut chooser = SoundChooser::new(vec![(1, "beep.wav".into())], 1);
        player.play_burst(&combo, &mut chooser).await;

        assert_eq!(event_sink.count(), 0);
    }
}
