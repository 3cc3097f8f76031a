//! XDG-style path helpers for config/state that live outside the audio
//! directory itself (which is always explicit, via config or `-c`).

use std::path::PathBuf;

/// Directory holding `config.toml`.
pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("/etc"))
            .join("audiobait")
    }
    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audiobait")
    }
}

/// Default audio directory: where `schedule.json` and downloaded sound
/// files live. Matches the original daemon's `/var/lib/audiobait` layout on
/// a deployed unit; falls back to an XDG data dir elsewhere.
pub fn default_audio_dir() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/var/lib/audiobait")
    }
    #[cfg(windows)]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("audiobait")
    }
}

pub const TEST_SOUND_PATH: &str = "/var/lib/audiobait/testSound.wav";
