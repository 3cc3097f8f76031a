//! Audio-output sink: hardware mixer level, then an external player
//! invocation. Fire-and-forget, no persistent IPC — the sink is not
//! reentrant, so every caller must go through the shared playback lock.

use std::path::Path;
use std::process::Stdio;

use audiobait_proto::error::{AudiobaitError, AudiobaitResult};
use tokio::process::Command;
use tracing::{debug, warn};

#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    async fn play(&self, path: &Path, volume: i32) -> AudiobaitResult<()>;
}

pub struct SoundCardPlayer {
    card: i32,
    control_name: String,
    player_binary: String,
}

impl SoundCardPlayer {
    pub fn new(card: i32, control_name: String, player_binary: String) -> Self {
        Self {
            card,
            control_name,
            player_binary,
        }
    }

    async fn set_volume(&self, volume: i32) -> AudiobaitResult<()> {
        let percent = format!("{}%", volume * 10);
        let output = Command::new("amixer")
            .args(["-c", &self.card.to_string(), "sset", &self.control_name, &percent])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AudiobaitError::AudioSink(format!("amixer spawn failed: {e}")))?;

        if !output.status.success() {
            return Err(AudiobaitError::AudioSink(format!(
                "amixer exited with {}: {}{}",
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AudioSink for SoundCardPlayer {
    async fn play(&self, path: &Path, volume: i32) -> AudiobaitResult<()> {
        self.set_volume(volume).await?;

        debug!(path = %path.display(), volume, "invoking player");
        let output = Command::new(&self.player_binary)
            .arg("-q")
            .arg(path)
            .env("AUDIODEV", format!("hw:{}", self.card))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AudiobaitError::AudioSink(format!("player spawn failed: {e}")))?;

        if !output.status.success() {
            warn!(path = %path.display(), status = %output.status, "player exited non-zero");
            return Err(AudiobaitError::AudioSink(format!(
                "{} exited with {}: {}{}",
                self.player_binary,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        Ok(())
    }
}
