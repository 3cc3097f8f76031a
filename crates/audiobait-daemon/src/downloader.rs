//! Long-running task owning the audio directory: fetches the schedule and
//! referenced sound files, and notifies the main loop of changes.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use audiobait_proto::error::{AudiobaitError, AudiobaitResult};
use audiobait_proto::file_library::{make_filename, FileLibrary};
use audiobait_proto::schedule::Schedule;
use rand::Rng;
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::api_client::{is_not_registered_error, ApiClient};
use crate::connection::ConnectionRequester;

const CONNECT_TIMEOUT: StdDuration = StdDuration::from_secs(120);
const CONNECT_RETRY_WAIT: StdDuration = StdDuration::from_secs(600);
const CONNECT_MAX_ATTEMPTS: u32 = 3;

const STEP_MAX_RETRIES: u32 = 4;
const STEP_RETRY_WAIT: StdDuration = StdDuration::from_secs(30);

const UPDATE_CHANNEL_CAPACITY: usize = 128;

/// Signals the main loop that a fresh schedule is on disk.
#[derive(Debug, Clone, Copy)]
pub struct Updated;

pub struct Downloader<A: ApiClient, C: ConnectionRequester> {
    api: Arc<A>,
    connection: Arc<C>,
    audio_dir: PathBuf,
    poll_low_minutes: u64,
    poll_high_minutes: u64,
}

impl<A: ApiClient, C: ConnectionRequester> Downloader<A, C> {
    pub fn new(
        api: Arc<A>,
        connection: Arc<C>,
        audio_dir: PathBuf,
        poll_low_minutes: u64,
        poll_high_minutes: u64,
    ) -> Self {
        Self {
            api,
            connection,
            audio_dir,
            poll_low_minutes,
            poll_high_minutes,
        }
    }

    /// Runs the outer loop until `stop` fires. Immediately attempts an
    /// update, then resleeps `low + U(0, high - low)` minutes between
    /// attempts regardless of whether the previous one succeeded.
    pub async fn run(self, sender: mpsc::Sender<Updated>, mut stop: mpsc::Receiver<()>) {
        loop {
            match self.update_once().await {
                Ok(true) => {
                    info!("schedule changed; notifying scheduler");
                    if sender.try_send(Updated).is_err() {
                        warn!("update channel full or closed; dropping notification");
                    }
                }
                Ok(false) => info!("schedule unchanged"),
                Err(err) => error!(error = %err, "schedule update failed"),
            }

            let span = self.poll_high_minutes.saturating_sub(self.poll_low_minutes);
            let extra_minutes = if span == 0 {
                0
            } else {
                rand::thread_rng().gen_range(0..=span)
            };
            let sleep = StdDuration::from_secs((self.poll_low_minutes + extra_minutes) * 60);

            tokio::select! {
                _ = tokio::time::sleep(sleep) => {}
                _ = stop.recv() => {
                    info!("downloader stopping");
                    return;
                }
            }
        }
    }

    /// One full update pass. Returns whether the schedule changed.
    async fn update_once(&self) -> AudiobaitResult<bool> {
        self.connection.start();
        let result = self.update_once_inner().await;
        self.connection.stop();
        result
    }

    async fn update_once_inner(&self) -> AudiobaitResult<bool> {
        self.connection
            .wait_until_up(CONNECT_TIMEOUT, CONNECT_RETRY_WAIT, CONNECT_MAX_ATTEMPTS)
            .await?;

        let schedule_bytes = match self.api.get_schedule().await {
            Ok(bytes) => bytes,
            Err(err) if is_not_registered_error(&err) => {
                info!("device not registered; exiting so the supervisor can restart us");
                std::process::exit(0);
            }
            Err(err) => return Err(err),
        };
        let schedule = Schedule::parse(&schedule_bytes).map_err(AudiobaitError::from)?;

        let part_path = self.audio_dir.join("schedule.json.part");
        let final_path = self.audio_dir.join("schedule.json");
        tokio::fs::write(&part_path, &schedule_bytes).await?;

        for id in schedule.referenced_sounds() {
            self.fetch_and_validate(id).await?;
        }

        let changed = Self::hashes_differ(&part_path, &final_path).await?;
        tokio::fs::rename(&part_path, &final_path).await?;
        Ok(changed)
    }

    /// Fetches metadata and downloads one referenced sound, with up to
    /// `STEP_MAX_RETRIES` attempts 30s apart. Skips a download whose
    /// filename is already present in the library.
    async fn fetch_and_validate(&self, id: i64) -> AudiobaitResult<()> {
        let mut last_err = None;
        for attempt in 1..=STEP_MAX_RETRIES {
            match self.fetch_and_validate_once(id).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    warn!(id, attempt, error = %err, "file fetch/download failed, retrying");
                    last_err = Some(err);
                    if attempt < STEP_MAX_RETRIES {
                        tokio::time::sleep(STEP_RETRY_WAIT).await;
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AudiobaitError::Network("unknown failure".into())))
    }

    async fn fetch_and_validate_once(&self, id: i64) -> AudiobaitResult<()> {
        let details = self.api.get_file_details(id).await?;
        let filename = make_filename(&details.file.details.original_name, &details.file.details.name, id);
        let dest = self.audio_dir.join(&filename);

        if dest.exists() {
            let meta = tokio::fs::metadata(&dest).await?;
            if meta.len() == details.file_size {
                return Ok(());
            }
        }

        self.api.download_file(id, &dest).await?;

        let meta = tokio::fs::metadata(&dest).await?;
        if meta.len() != details.file_size {
            let _ = tokio::fs::remove_file(&dest).await;
            return Err(AudiobaitError::Validation(format!(
                "file {id}: expected {} bytes, got {}",
                details.file_size,
                meta.len()
            )));
        }
        Ok(())
    }

    /// Compares the would-be new schedule against what's currently on disk.
    /// The original compares MD5 digests; this stack hashes with SHA-256
    /// instead (no MD5 crate in the dependency set), which serves the same
    /// change-detection purpose.
    async fn hashes_differ(part_path: &Path, final_path: &Path) -> AudiobaitResult<bool> {
        let new_bytes = tokio::fs::read(part_path).await?;
        let new_hash = Sha256::digest(&new_bytes);

        let existing = match tokio::fs::read(final_path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(err) => return Err(err.into()),
        };
        let existing_hash = Sha256::digest(&existing);
        Ok(new_hash != existing_hash)
    }
}

/// Builds a `FileLibrary` view of whatever the downloader has landed so far.
pub fn current_library(audio_dir: &Path) -> FileLibrary {
    FileLibrary::open(audio_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_client::{FileDetails, FileDetailsFields, FileDetailsInner};
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeApi {
        schedule: Vec<u8>,
        not_registered: bool,
    }

    #[async_trait::async_trait]
    impl ApiClient for FakeApi {
        async fn get_schedule(&self) -> AudiobaitResult<Vec<u8>> {
            if self.not_registered {
                return Err(AudiobaitError::NotRegistered);
            }
            Ok(self.schedule.clone())
        }

        async fn get_file_details(&self, id: i64) -> AudiobaitResult<FileDetails> {
            Ok(FileDetails {
                file: FileDetailsInner {
                    details: FileDetailsFields {
                        original_name: "call.wav".into(),
                        name: format!("sound{id}"),
                    },
                },
                file_size: 4,
            })
        }

        async fn download_file(&self, _id: i64, dest_path: &Path) -> AudiobaitResult<()> {
            tokio::fs::write(dest_path, b"data").await?;
            Ok(())
        }
    }

    struct NullConnection(Mutex<()>);

    #[async_trait::async_trait]
    impl ConnectionRequester for NullConnection {
        fn start(&self) {}
        fn stop(&self) {}
        async fn wait_until_up(
            &self,
            _timeout: StdDuration,
            _retry_interval: StdDuration,
            _max_retries: u32,
        ) -> AudiobaitResult<()> {
            let _ = self.0.lock().unwrap();
            Ok(())
        }
    }

    #[tokio::test]
    async fn first_update_reports_changed_and_downloads_files() {
        let dir = tempfile::tempdir().unwrap();
        let schedule = br#"{"description":"d","controlNights":0,"playNights":0,"startDay":0,"combos":[{"from":"12:00","until":"13:00","every":1800,"waits":[0],"volumes":[10],"sounds":["1"]}],"allsounds":[]}"#;
        let downloader = Downloader::new(
            Arc::new(FakeApi {
                schedule: schedule.to_vec(),
                not_registered: false,
            }),
            Arc::new(NullConnection(Mutex::new(()))),
            dir.path().to_path_buf(),
            45,
            75,
        );

        let changed = downloader.update_once().await.unwrap();
        assert!(changed);
        assert!(dir.path().join("schedule.json").exists());
        assert!(!dir.path().join("schedule.json.part").exists());
        assert!(dir.path().join("sound1-1.wav").exists());
    }

    #[tokio::test]
    async fn unchanged_schedule_reports_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let schedule = br#"{"description":"d","controlNights":0,"playNights":0,"startDay":0,"combos":[],"allsounds":[]}"#;
        let downloader = Downloader::new(
            Arc::new(FakeApi {
                schedule: schedule.to_vec(),
                not_registered: false,
            }),
            Arc::new(NullConnection(Mutex::new(()))),
            dir.path().to_path_buf(),
            45,
            75,
        );

        assert!(downloader.update_once().await.unwrap());
        assert!(!downloader.update_once().await.unwrap());
    }
}
