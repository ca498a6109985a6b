use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::frame::AudioFrame;

/// Capacity of the capture-to-classifier queue. Small on purpose: if the
/// consumer stalls, real-time behaviour is preserved by shedding the oldest
/// frames rather than growing a backlog.
pub const FRAME_QUEUE_CAPACITY: usize = 4;

/// Single-producer frame queue between the capture thread and the
/// classifier task. Overflow drops the oldest frame.
#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<Mutex<VecDeque<AudioFrame>>>,
    capacity: usize,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Called from the audio callback. Must not block beyond the short
    /// mutex hold.
    pub fn push(&self, frame: AudioFrame) {
        let mut q = self.inner.lock();
        if q.len() >= self.capacity {
            q.pop_front();
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
        q.push_back(frame);
    }

    pub fn pop(&self) -> Option<AudioFrame> {
        self.inner.lock().pop_front()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(FRAME_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(seq: u64) -> AudioFrame {
        AudioFrame::new(seq, vec![0; 4])
    }

    #[test]
    fn fifo_order() {
        let q = FrameQueue::new(4);
        q.push(frame(1));
        q.push(frame(2));
        assert_eq!(q.pop().unwrap().seq, 1);
        assert_eq!(q.pop().unwrap().seq, 2);
        assert!(q.pop().is_none());
    }

    #[test]
    fn overflow_drops_oldest() {
        let q = FrameQueue::new(4);
        for seq in 0..6 {
            q.push(frame(seq));
        }
        assert_eq!(q.dropped(), 2);
        assert_eq!(q.pop().unwrap().seq, 2);
        assert_eq!(q.len(), 3);
    }
}
