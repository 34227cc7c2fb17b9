use std::io::Cursor;

use hound::WavReader;

/// Format details read from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel
    pub frames: u32,
    pub duration_millis: u64,
}

impl ClipInfo {
    /// Probe an in-memory payload. Returns `None` for anything that is not a
    /// readable WAV stream.
    pub fn probe(bytes: &[u8]) -> Option<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).ok()?;
        let spec = reader.spec();

        if spec.sample_rate == 0 {
            return None;
        }

        let frames = reader.duration();
        let duration_millis = frames as u64 * 1000 / spec.sample_rate as u64;

        Some(Self {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            frames,
            duration_millis,
        })
    }
}
