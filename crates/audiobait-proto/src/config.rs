use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AudiobaitError, AudiobaitResult};
use crate::platform;

fn default_audio_dir() -> PathBuf {
    platform::default_audio_dir()
}
fn default_api_base_url() -> String {
    "https://api.cacophony.org.nz".to_string()
}
fn default_device_group() -> String {
    String::new()
}
fn default_api_key() -> String {
    String::new()
}
fn default_card() -> i32 {
    0
}
fn default_volume_control() -> String {
    "PCM".to_string()
}
fn default_player_binary() -> String {
    "play".to_string()
}
fn default_rpc_bind_address() -> String {
    "127.0.0.1".to_string()
}
fn default_rpc_port() -> u16 {
    9980
}
fn default_poll_interval_minutes_low() -> u64 {
    45
}
fn default_poll_interval_minutes_high() -> u64 {
    75
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Device group this unit registered under; sent as `X-Device-Group`.
    #[serde(default = "default_device_group")]
    pub device_group: String,
    /// Bearer credential issued at registration time.
    #[serde(default = "default_api_key")]
    pub api_key: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            audio_dir: default_audio_dir(),
            api_base_url: default_api_base_url(),
            device_group: default_device_group(),
            api_key: default_api_key(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_card")]
    pub card: i32,
    #[serde(default = "default_volume_control")]
    pub volume_control: String,
    #[serde(default = "default_player_binary")]
    pub player_binary: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            card: default_card(),
            volume_control: default_volume_control(),
            player_binary: default_player_binary(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_rpc_port")]
    pub port: u16,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            bind_address: default_rpc_bind_address(),
            port: default_rpc_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval_minutes_low")]
    pub interval_minutes_low: u64,
    #[serde(default = "default_poll_interval_minutes_high")]
    pub interval_minutes_high: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_minutes_low: default_poll_interval_minutes_low(),
            interval_minutes_high: default_poll_interval_minutes_high(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Loads config from `path`, creating a default file there if absent.
    pub fn load(path: &Path) -> AudiobaitResult<Self> {
        if !path.exists() {
            let default = Self::default();
            default.save(path)?;
            return Ok(default);
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| AudiobaitError::Config(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(AudiobaitError::from)
    }

    pub fn save(&self, path: &Path) -> AudiobaitResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    /// Resolves the config file path: an explicit `-c/--config` directory
    /// argument takes precedence over the platform default.
    pub fn config_path(override_dir: Option<&Path>) -> PathBuf {
        match override_dir {
            Some(dir) => dir.join("config.toml"),
            None => platform::config_dir().join("config.toml"),
        }
    }
}
