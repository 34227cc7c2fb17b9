use std::time::Duration;

use tracing::debug;

use super::clip::ClipInfo;
use crate::error::PlaybackError;
use crate::models::PlaybackSettings;

/// Audio output capability
///
/// `play` resolves when playback has ended (`Ok`) or failed (`Err`).
/// Callers never invoke it again before the previous call has resolved.
///
/// Implementations:
/// - `TimedPlayer`: headless, waits out the clip length
/// - device players live outside this crate
#[async_trait::async_trait]
pub trait Player: Send + Sync {
    async fn play(&self, audio: &[u8], settings: &PlaybackSettings) -> Result<(), PlaybackError>;

    /// Player name for logging
    fn name(&self) -> &str;
}

/// Player for hosts without an output device
///
/// Takes as long as the clip would: the WAV duration divided by the playback
/// rate, or a fixed fallback when the payload is not WAV.
#[derive(Debug, Clone)]
pub struct TimedPlayer {
    fallback: Duration,
}

impl TimedPlayer {
    pub fn new(fallback: Duration) -> Self {
        Self { fallback }
    }

    pub fn playback_duration(
        &self,
        audio: &[u8],
        settings: &PlaybackSettings,
    ) -> Result<Duration, PlaybackError> {
        if audio.is_empty() {
            return Err(PlaybackError::Decode("empty audio payload".to_string()));
        }

        let natural = ClipInfo::probe(audio)
            .map(|clip| Duration::from_millis(clip.duration_millis))
            .unwrap_or(self.fallback);

        Ok(natural.div_f32(settings.clamped().rate))
    }
}

impl Default for TimedPlayer {
    fn default() -> Self {
        Self::new(Duration::from_millis(1500))
    }
}

#[async_trait::async_trait]
impl Player for TimedPlayer {
    async fn play(&self, audio: &[u8], settings: &PlaybackSettings) -> Result<(), PlaybackError> {
        let duration = self.playback_duration(audio, settings)?;

        debug!(
            "Playing {} bytes for {}ms (volume {:.2}, pitch {:.2}, rate {:.2})",
            audio.len(),
            duration.as_millis(),
            settings.volume,
            settings.pitch,
            settings.rate
        );

        tokio::time::sleep(duration).await;
        Ok(())
    }

    fn name(&self) -> &str {
        "timed"
    }
}
