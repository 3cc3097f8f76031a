//! Local RPC service: the on-device bus described in §6, realised here as
//! an `axum::Router` bound to loopback. Scheduled and ad-hoc playback share
//! a single process-wide lock, so calls here serialise with the combo loop.

use std::path::PathBuf;
use std::sync::Arc;

use audiobait_proto::error::{AudiobaitError, AudiobaitResult};
use audiobait_proto::event::PlayEvent;
use audiobait_proto::file_library::FileLibrary;
use audiobait_proto::platform::TEST_SOUND_PATH;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;

use crate::audio_sink::AudioSink;
use crate::recorder::AsyncEventSink;

pub struct RpcState<S: AudioSink, E: AsyncEventSink> {
    sink: S,
    event_sink: E,
    audio_dir: PathBuf,
    /// Shared with the combo loop: exactly one playback, scheduled or
    /// on-demand, proceeds at a time.
    playback_lock: Arc<Mutex<()>>,
}

impl<S: AudioSink, E: AsyncEventSink> RpcState<S, E> {
    pub fn new(sink: S, event_sink: E, audio_dir: PathBuf, playback_lock: Arc<Mutex<()>>) -> Self {
        Self {
            sink,
            event_sink,
            audio_dir,
            playback_lock,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayFromIdRequest {
    file_id: i64,
    volume: i32,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default)]
    event_json: String,
}

#[derive(Debug, Serialize)]
pub struct PlayFromIdResponse {
    played: bool,
}

#[derive(Debug, Deserialize)]
pub struct PlayTestRequest {
    volume: i32,
}

pub fn router<S, E>(state: Arc<RpcState<S, E>>) -> Router
where
    S: AudioSink + 'static,
    E: AsyncEventSink + 'static,
{
    Router::new()
        .route("/play", post(play_from_id))
        .route("/play-test", post(play_test_sound))
        .with_state(state)
}

/// §4.7 `play_from_id`: re-open the library fresh, look up the id, play,
/// and (on success) hand a merged event to the event sink.
async fn play_from_id<S, E>(
    State(state): State<Arc<RpcState<S, E>>>,
    Json(req): Json<PlayFromIdRequest>,
) -> Result<Json<PlayFromIdResponse>, AudiobaitError>
where
    S: AudioSink,
    E: AsyncEventSink,
{
    let _guard = state.playback_lock.lock().await;

    let library = FileLibrary::open(&state.audio_dir);
    let filename = library
        .get(req.file_id)
        .ok_or_else(|| AudiobaitError::NotFound(format!("file {}", req.file_id)))?
        .to_string();

    let played_at = chrono::Utc::now();
    let path = state.audio_dir.join(&filename);
    state.sink.play(&path, req.volume).await?;

    if !req.event_json.is_empty() {
        let event = PlayEvent::from_partial_json(
            &req.event_json,
            played_at,
            req.file_id,
            req.volume,
            req.priority,
        )
        .map_err(AudiobaitError::from)?;
        if let Err(err) = state.event_sink.add_event(&event).await {
            tracing::warn!(error = %err, file_id = req.file_id, "failed to record rpc play event");
        }
    }

    info!(file_id = req.file_id, volume = req.volume, "played via rpc");
    Ok(Json(PlayFromIdResponse { played: true }))
}

/// §4.7 `play_test_sound`: plays the fixed test clip, no event emitted.
async fn play_test_sound<S, E>(
    State(state): State<Arc<RpcState<S, E>>>,
    Json(req): Json<PlayTestRequest>,
) -> Result<(), AudiobaitError>
where
    S: AudioSink,
    E: AsyncEventSink,
{
    let _guard = state.playback_lock.lock().await;
    state
        .sink
        .play(std::path::Path::new(TEST_SOUND_PATH), req.volume)
        .await?;
    Ok(())
}
