pub mod classifier;
pub mod config;
pub mod constants;
pub mod engine;
pub mod webrtc;

pub use classifier::{FrameClassifier, FrameVerdict};
pub use config::VadConfig;
pub use constants::{FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use engine::{VadEngine, VadError};
pub use webrtc::WebRtcEngine;
