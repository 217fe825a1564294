//! Runtime configuration for the broadcast engine and server.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::listener::DEFAULT_LISTENER_BACKLOG;

/// Bit rate assumed when the mixer cannot probe the track.
pub const FALLBACK_BIT_RATE: u64 = 128_000;
/// Bits per byte, used to turn a bit rate into a throttle byte rate.
pub const BIT_RATE_DIVISOR: u64 = 8;

/// Every recognized option of the broadcast server.
///
/// Missing fields in a JSON config file fall back to [`BroadcastConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Base track broadcast on `start`.
    pub track_path: PathBuf,
    /// Directory searched for effect files.
    pub fx_dir: PathBuf,
    /// Root of the static pages served next to the stream.
    pub public_dir: PathBuf,
    pub fallback_bit_rate: u64,
    pub bit_rate_divisor: u64,
    /// Media format tag handed to the mixer (`-t`).
    pub audio_format: String,
    /// Volume weight of the base track while merging.
    pub song_volume: String,
    /// Volume weight of the effect while merging.
    pub fx_volume: String,
    /// `Content-Type` of the listener stream.
    pub audio_media_type: String,
    pub mixer_program: String,
    /// Read size of the pipeline, in bytes.
    pub chunk_size: usize,
    /// Chunks queued per listener before a slow listener is dropped.
    pub listener_backlog: usize,
    pub detach_timeout_ms: u64,
    pub mixer_timeout_ms: u64,
    pub host: String,
    pub port: u16,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            track_path: PathBuf::from("audio/songs/conversation.mp3"),
            fx_dir: PathBuf::from("audio/fx"),
            public_dir: PathBuf::from("public"),
            fallback_bit_rate: FALLBACK_BIT_RATE,
            bit_rate_divisor: BIT_RATE_DIVISOR,
            audio_format: "mp3".to_string(),
            song_volume: "0.99".to_string(),
            fx_volume: "0.1".to_string(),
            audio_media_type: "audio/mpeg".to_string(),
            mixer_program: "sox".to_string(),
            chunk_size: 4096,
            listener_backlog: DEFAULT_LISTENER_BACKLOG,
            detach_timeout_ms: 2000,
            mixer_timeout_ms: 5000,
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl BroadcastConfig {
    /// Load a config from a JSON file, filling absent fields with defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid JSON.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Pretty JSON rendering, as printed by `onair create config-json`.
    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Convert a bit rate into the byte rate the throttle releases at.
    pub fn bytes_per_second(&self, bit_rate: u64) -> u64 {
        (bit_rate / self.bit_rate_divisor.max(1)).max(1)
    }

    pub fn detach_timeout(&self) -> Duration {
        Duration::from_millis(self.detach_timeout_ms)
    }

    pub fn mixer_timeout(&self) -> Duration {
        Duration::from_millis(self.mixer_timeout_ms)
    }
}
