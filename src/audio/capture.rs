use std::io::Cursor;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::CaptureError;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture device
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Captured audio beyond this length is dropped
    pub max_duration: Duration,
}

impl CaptureConfig {
    fn max_samples(&self) -> usize {
        (self.max_duration.as_millis() as u64 * self.sample_rate as u64 / 1000) as usize
            * self.channels as usize
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            max_duration: Duration::from_secs(300),
        }
    }
}

/// Audio capture capability
///
/// The stores only ever see the byte payload returned by `stop_capture`.
#[async_trait::async_trait]
pub trait Recorder: Send + Sync {
    async fn start_capture(&mut self) -> Result<(), CaptureError>;

    /// Finish capturing and return the encoded audio
    async fn stop_capture(&mut self) -> Result<Vec<u8>, CaptureError>;

    fn is_capturing(&self) -> bool;

    /// Recorder name for logging
    fn name(&self) -> &str;
}

/// Collects PCM frames from a channel and encodes them as a WAV file in memory
///
/// A capture source obtains a sender with `frame_sender` after
/// `start_capture` and pushes frames into it.
pub struct WavRecorder {
    config: CaptureConfig,
    active: Option<ActiveCapture>,
}

struct ActiveCapture {
    frame_tx: mpsc::Sender<AudioFrame>,
    stop: CancellationToken,
    collector: JoinHandle<Vec<i16>>,
}

impl WavRecorder {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            active: None,
        }
    }

    pub fn frame_sender(&self) -> Option<mpsc::Sender<AudioFrame>> {
        self.active.as_ref().map(|capture| capture.frame_tx.clone())
    }

    async fn collect(
        mut frame_rx: mpsc::Receiver<AudioFrame>,
        stop: CancellationToken,
        config: CaptureConfig,
    ) -> Vec<i16> {
        let max_samples = config.max_samples();
        let mut samples = Vec::new();
        let mut truncated = false;

        let mut accept = |frame: AudioFrame, samples: &mut Vec<i16>| {
            if frame.sample_rate != config.sample_rate || frame.channels != config.channels {
                warn!(
                    "Dropping frame at {}ms: {}Hz/{}ch does not match {}Hz/{}ch",
                    frame.timestamp_ms,
                    frame.sample_rate,
                    frame.channels,
                    config.sample_rate,
                    config.channels
                );
                return;
            }

            let room = max_samples.saturating_sub(samples.len());
            if frame.samples.len() > room && !truncated {
                truncated = true;
                warn!(
                    "Capture reached {}s limit, dropping further audio",
                    config.max_duration.as_secs()
                );
            }
            samples.extend(frame.samples.into_iter().take(room));
        };

        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                frame = frame_rx.recv() => match frame {
                    Some(frame) => accept(frame, &mut samples),
                    None => break,
                },
            }
        }

        // Frames sent before the stop request still belong to the take
        while let Ok(frame) = frame_rx.try_recv() {
            accept(frame, &mut samples);
        }

        samples
    }

    fn encode(&self, samples: &[i16]) -> Result<Vec<u8>, CaptureError> {
        let spec = hound::WavSpec {
            channels: self.config.channels,
            sample_rate: self.config.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .map_err(|e| CaptureError::Encode(e.to_string()))?;

            for &sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| CaptureError::Encode(e.to_string()))?;
            }

            writer
                .finalize()
                .map_err(|e| CaptureError::Encode(e.to_string()))?;
        }

        Ok(cursor.into_inner())
    }
}

#[async_trait::async_trait]
impl Recorder for WavRecorder {
    async fn start_capture(&mut self) -> Result<(), CaptureError> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyCapturing);
        }

        let (frame_tx, frame_rx) = mpsc::channel(100);
        let stop = CancellationToken::new();
        let collector = tokio::spawn(Self::collect(frame_rx, stop.clone(), self.config.clone()));

        self.active = Some(ActiveCapture {
            frame_tx,
            stop,
            collector,
        });

        info!(
            "Capture started ({}Hz, {}ch)",
            self.config.sample_rate, self.config.channels
        );
        Ok(())
    }

    async fn stop_capture(&mut self) -> Result<Vec<u8>, CaptureError> {
        let capture = self.active.take().ok_or(CaptureError::NotCapturing)?;

        capture.stop.cancel();
        drop(capture.frame_tx);

        let samples = capture
            .collector
            .await
            .map_err(|e| CaptureError::Encode(format!("collector task failed: {}", e)))?;

        let wav = self.encode(&samples)?;

        info!(
            "Capture stopped: {} samples, {} bytes",
            samples.len(),
            wav.len()
        );
        Ok(wav)
    }

    fn is_capturing(&self) -> bool {
        self.active.is_some()
    }

    fn name(&self) -> &str {
        "wav"
    }
}
