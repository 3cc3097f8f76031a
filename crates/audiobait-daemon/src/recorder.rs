//! Event recorder: the capability installed on the `SchedulePlayer` that
//! turns a successful play into a durable record, plus the default
//! file-backed `AsyncEventSink` it records through.

use std::path::PathBuf;
use std::sync::Arc;

use audiobait_proto::error::AudiobaitResult;
use audiobait_proto::event::PlayEvent;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

/// Default event sink: the original dbus Events queue has no analogue in
/// this stack, so events are appended as JSON lines to a log file under the
/// audio directory. Enqueue failures are logged and swallowed by the
/// recorder, never by the sink itself — `add_event` still reports them.
pub struct FileEventSink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileEventSink {
    pub fn new(audio_dir: &std::path::Path) -> Self {
        Self {
            path: audio_dir.join("events.jsonl"),
            file: Mutex::new(None),
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        let mut guard = self.file.lock().await;
        if guard.is_none() {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        let file = guard.as_mut().unwrap();
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[async_trait::async_trait]
pub trait AsyncEventSink: Send + Sync {
    async fn add_event(&self, event: &PlayEvent) -> AudiobaitResult<()>;
}

#[async_trait::async_trait]
impl AsyncEventSink for FileEventSink {
    async fn add_event(&self, event: &PlayEvent) -> AudiobaitResult<()> {
        let line = serde_json::to_string(event).map_err(audiobait_proto::AudiobaitError::from)?;
        self.append(&line)
            .await
            .map_err(audiobait_proto::AudiobaitError::from)
    }
}

/// The capability installed on a `SchedulePlayer`: records a successful
/// play via whatever `AsyncEventSink` it was built with. Holds the sink
/// behind an `Arc` so a caller can keep a handle for inspection (tests) or
/// share one sink across recorders (design note 9).
pub struct EventRecorder<S: AsyncEventSink> {
    sink: Arc<S>,
}

impl<S: AsyncEventSink> EventRecorder<S> {
    pub fn new(sink: S) -> Self {
        Self { sink: Arc::new(sink) }
    }

    /// Builds a recorder over a sink the caller already holds an `Arc` to,
    /// so the caller can keep inspecting it after handing a clone off.
    pub fn new_shared(sink: Arc<S>) -> Self {
        Self { sink }
    }

    /// Called on every successful scheduled playback. Enqueue failures are
    /// logged and swallowed — they must never interrupt playback.
    pub async fn record(&self, event: PlayEvent) {
        if let Err(err) = self.sink.add_event(&event).await {
            warn!(error = %err, file_id = event.details.file_id, "failed to record play event");
        }
    }
}
