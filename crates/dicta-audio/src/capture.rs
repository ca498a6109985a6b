use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use tracing::{error, info, warn};

use dicta_foundation::AudioError;
use dicta_vad::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

use crate::frame::AudioFrame;
use crate::queue::FrameQueue;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Preferred input device name; `None` uses the host default.
    pub device: Option<String>,
    pub sample_rate_hz: u32,
    pub frame_size_samples: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate_hz: SAMPLE_RATE_HZ,
            frame_size_samples: FRAME_SIZE_SAMPLES,
        }
    }
}

#[derive(Debug, Default)]
pub struct CaptureStats {
    pub frames_captured: AtomicU64,
    pub callback_errors: AtomicU64,
}

/// Handle to the dedicated audio thread. The cpal stream lives and dies on
/// that thread; the microphone is owned here exclusively.
pub struct AudioCaptureThread {
    handle: Option<JoinHandle<()>>,
    running: Arc<AtomicBool>,
    pub stats: Arc<CaptureStats>,
}

impl AudioCaptureThread {
    /// Open the device and start producing frames into `queue`. Returns
    /// once the stream is live, or with the open error.
    pub fn spawn(config: CaptureConfig, queue: FrameQueue) -> Result<Self, AudioError> {
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(CaptureStats::default());
        let (ready_tx, ready_rx) = bounded::<Result<(), AudioError>>(1);

        let thread_running = running.clone();
        let thread_stats = stats.clone();
        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match open_stream(&config, queue, thread_stats) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                if let Err(e) = stream.play() {
                    error!("Failed to start audio stream: {}", e);
                    return;
                }
                info!("Audio capture started");

                // The callback does all the work; this thread just keeps the
                // stream alive until shutdown.
                while thread_running.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }
                drop(stream);
                info!("Audio capture stopped");
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn capture thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                handle: Some(handle),
                running,
                stats,
            }),
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => Err(AudioError::Fatal("capture thread died during startup".into())),
        }
    }

    pub fn stop(mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn open_stream(
    config: &CaptureConfig,
    queue: FrameQueue,
    stats: Arc<CaptureStats>,
) -> Result<cpal::Stream, AudioError> {
    let host = cpal::default_host();
    let device = match &config.device {
        Some(name) => host
            .input_devices()
            .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| &n == name).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(name.clone()),
            })?,
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None })?,
    };

    let device_name = device.name().unwrap_or_else(|_| "<unknown>".into());
    info!("Opening input device: {}", device_name);

    let sample_format = device
        .default_input_config()
        .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?
        .sample_format();

    let stream_config = StreamConfig {
        channels: 1,
        sample_rate: SampleRate(config.sample_rate_hz),
        buffer_size: BufferSize::Default,
    };

    let mut assembler = FrameAssembler::new(config.frame_size_samples, queue, stats.clone());
    let err_stats = stats;
    let err_fn = move |e: cpal::StreamError| {
        err_stats.callback_errors.fetch_add(1, Ordering::Relaxed);
        warn!("Audio stream error: {}", e);
    };

    let stream = match sample_format {
        SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _| assembler.extend(data),
            err_fn,
            None,
        ),
        SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _| {
                let converted: Vec<i16> = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                assembler.extend(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{other:?}"),
            })
        }
    }
    .map_err(|e| AudioError::DeviceUnavailable(e.to_string()))?;

    Ok(stream)
}

/// Accumulates callback buffers into fixed-size frames.
struct FrameAssembler {
    frame_size: usize,
    pending: Vec<i16>,
    seq: u64,
    queue: FrameQueue,
    stats: Arc<CaptureStats>,
}

impl FrameAssembler {
    fn new(frame_size: usize, queue: FrameQueue, stats: Arc<CaptureStats>) -> Self {
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size * 2),
            seq: 0,
            queue,
            stats,
        }
    }

    fn extend(&mut self, samples: &[i16]) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_size {
            let rest = self.pending.split_off(self.frame_size);
            let frame_samples = std::mem::replace(&mut self.pending, rest);
            self.queue.push(AudioFrame::new(self.seq, frame_samples));
            self.seq += 1;
            self.stats.frames_captured.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembler_emits_fixed_frames() {
        let queue = FrameQueue::new(16);
        let stats = Arc::new(CaptureStats::default());
        let mut assembler = FrameAssembler::new(4, queue.clone(), stats.clone());

        assembler.extend(&[1, 2, 3]);
        assert!(queue.is_empty());

        assembler.extend(&[4, 5]);
        let frame = queue.pop().unwrap();
        assert_eq!(frame.seq, 0);
        assert_eq!(frame.samples, vec![1, 2, 3, 4]);
        assert_eq!(queue.len(), 0);
        assert_eq!(stats.frames_captured.load(Ordering::Relaxed), 1);

        assembler.extend(&[6, 7, 8, 9, 10]);
        let frame = queue.pop().unwrap();
        assert_eq!(frame.seq, 1);
        assert_eq!(frame.samples, vec![5, 6, 7, 8]);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn assembler_sequence_is_monotonic() {
        let queue = FrameQueue::new(64);
        let stats = Arc::new(CaptureStats::default());
        let mut assembler = FrameAssembler::new(2, queue.clone(), stats);

        assembler.extend(&[0; 10]);
        let mut last = None;
        while let Some(frame) = queue.pop() {
            if let Some(prev) = last {
                assert_eq!(frame.seq, prev + 1);
            }
            last = Some(frame.seq);
        }
        assert_eq!(last, Some(4));
    }
}
