use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::audio::CaptureConfig;
use crate::models::PlaybackSettings;
use crate::training::TrainingOptions;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub capture: CaptureSettings,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "parrot-talk".to_string(),
            http: HttpConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8470,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the file store; `~` is expanded
    pub data_dir: String,
}

impl StorageConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.data_dir).as_ref())
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.parrot-talk".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub repetitions: u32,
    pub interval_ms: u64,
    pub random_order: bool,
}

impl TrainingConfig {
    pub fn options(&self) -> TrainingOptions {
        TrainingOptions::new(
            self.repetitions,
            Duration::from_millis(self.interval_ms),
            self.random_order,
        )
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            repetitions: 1,
            interval_ms: 1000,
            random_order: false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub volume: f32,
    pub pitch: f32,
    pub rate: f32,
    /// Assumed clip length when the payload has no readable WAV header
    pub fallback_clip_ms: u64,
}

impl PlaybackConfig {
    pub fn settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            volume: self.volume,
            pitch: self.pitch,
            rate: self.rate,
        }
        .clamped()
    }

    pub fn fallback_clip(&self) -> Duration {
        Duration::from_millis(self.fallback_clip_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            volume: 1.0,
            pitch: 1.0,
            rate: 1.0,
            fallback_clip_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub max_duration_secs: u64,
}

impl CaptureSettings {
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            max_duration: Duration::from_secs(self.max_duration_secs),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            max_duration_secs: 300,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Ok(settings.try_deserialize()?)
    }
}
