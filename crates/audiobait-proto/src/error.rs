//! Centralized error type for the audiobait scheduler.
//!
//! Mirrors the error kinds a real device deployment has to tell apart: which
//! ones the downloader retries past, which one means "stop, the supervisor
//! will restart us", and which ones the RPC surface needs to report back to
//! a caller as a structured value rather than a bare string.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, Serialize)]
#[serde(tag = "kind", content = "details")]
pub enum AudiobaitError {
    #[error("network error: {0}")]
    Network(String),

    #[error("api error: {0}")]
    Api(String),

    #[error("device not registered")]
    NotRegistered,

    #[error("could not decode: {0}")]
    Decode(String),

    #[error("filesystem error: {0}")]
    FilesystemIo(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("audio sink error: {0}")]
    AudioSink(String),

    #[error("event sink error: {0}")]
    EventSink(String),

    #[error("bus name already taken: {0}")]
    BusNameTaken(String),

    #[error("lock contention: {0}")]
    LockContention(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AudiobaitError {
    /// Machine-readable error code, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Network(_) => "network_error",
            Self::Api(_) => "api_error",
            Self::NotRegistered => "not_registered",
            Self::Decode(_) => "decode_error",
            Self::FilesystemIo(_) => "filesystem_io_error",
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::AudioSink(_) => "audio_sink_error",
            Self::EventSink(_) => "event_sink_error",
            Self::BusNameTaken(_) => "bus_name_taken",
            Self::LockContention(_) => "lock_contention",
            Self::Config(_) => "config_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) | Self::Decode(_) | Self::Config(_) => StatusCode::BAD_REQUEST,
            Self::Network(_) | Self::Api(_) => StatusCode::BAD_GATEWAY,
            Self::NotRegistered
            | Self::BusNameTaken(_)
            | Self::AudioSink(_)
            | Self::EventSink(_)
            | Self::FilesystemIo(_)
            | Self::LockContention(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for errors the downloader's outer loop should retry past rather
    /// than surface as a fatal condition.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::NotRegistered | Self::BusNameTaken(_))
    }
}

pub type AudiobaitResult<T> = Result<T, AudiobaitError>;

#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for AudiobaitError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AudiobaitError {
    fn from(err: std::io::Error) -> Self {
        Self::FilesystemIo(err.to_string())
    }
}

impl From<serde_json::Error> for AudiobaitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for AudiobaitError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<toml::de::Error> for AudiobaitError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for AudiobaitError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config(err.to_string())
    }
}
