pub mod capture;
pub mod frame;
pub mod queue;

pub use capture::{AudioCaptureThread, CaptureConfig, CaptureStats};
pub use frame::AudioFrame;
pub use queue::{FrameQueue, FRAME_QUEUE_CAPACITY};
