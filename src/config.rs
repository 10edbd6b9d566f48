//! Configuration types for sticker-porter

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Telegram Bot API access (the source platform)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    pub bot_token: String,

    /// API base URL (default: "https://api.telegram.org")
    ///
    /// Overridable so tests can point the client at a mock server.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

/// TamTam Bot API access (the destination platform)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TamTamConfig {
    /// Access token passed as the `access_token` query parameter
    pub access_token: String,

    /// API base URL (default: "https://botapi.tamtam.chat")
    #[serde(default = "default_tamtam_api_base")]
    pub api_base: String,
}

/// Packaging pipeline behavior (output location, fan-out, archive sizing)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Directory archives are written to (default: ".")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Maximum in-flight fetch+transcode tasks (default: 10)
    ///
    /// Bounds the raw plus transcoded bytes held in memory at once and keeps
    /// the request rate against Telegram within its implicit tolerance.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Maximum entries per archive (default: 50)
    ///
    /// TamTam's sticker importer rejects archives with more entries.
    #[serde(default = "default_max_archive_entries")]
    pub max_archive_entries: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_archive_entries: default_max_archive_entries(),
        }
    }
}

/// Retry behavior for the message send loop
///
/// TamTam needs time to process an uploaded binary; until it has, attaching
/// it to a message fails with `400` and a `file.not.processed` marker. That
/// one condition is retried with linearly increasing delays
/// (`initial_delay`, `initial_delay + delay_step`, ...); everything else
/// fails on the first attempt.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SendRetryConfig {
    /// Maximum total send attempts before giving up (default: 5)
    #[serde(default = "default_send_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_send_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Added to the delay after every retry (default: 1 second)
    #[serde(default = "default_send_delay_step", with = "duration_serde")]
    pub delay_step: Duration,
}

impl Default for SendRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_send_max_attempts(),
            initial_delay: default_send_initial_delay(),
            delay_step: default_send_delay_step(),
        }
    }
}

impl SendRetryConfig {
    /// Delay before retry number `retry` (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay + self.delay_step * retry.saturating_sub(1)
    }
}

/// Main configuration for the converter
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Source platform access
    pub telegram: TelegramConfig,

    /// Destination platform access
    pub tamtam: TamTamConfig,

    /// Packaging pipeline behavior
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Message send retry behavior
    #[serde(default)]
    pub send_retry: SendRetryConfig,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_tamtam_api_base() -> String {
    "https://botapi.tamtam.chat".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_concurrent_fetches() -> usize {
    10
}

fn default_max_archive_entries() -> usize {
    50
}

fn default_send_max_attempts() -> u32 {
    5
}

fn default_send_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_send_delay_step() -> Duration {
    Duration::from_secs(1)
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
