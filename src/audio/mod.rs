pub mod capture;
pub mod clip;
pub mod player;

pub use capture::{AudioFrame, CaptureConfig, Recorder, WavRecorder};
pub use clip::ClipInfo;
pub use player::{Player, TimedPlayer};
