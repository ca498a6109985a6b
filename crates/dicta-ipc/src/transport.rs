use std::time::{Duration, Instant};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::message::{OutboundMessage, ProofStreamEvent, StatusColor};

/// Ceiling on `AUDIO_AMP` messages actually written to the transport.
const AMP_MIN_INTERVAL: Duration = Duration::from_millis(34);

/// Cloneable sending half of the status bus. Every task that needs to talk
/// to the UI holds one of these; the single writer task at the other end
/// guarantees interleaving-free lines.
#[derive(Clone)]
pub struct StatusBus {
    tx: mpsc::Sender<OutboundMessage>,
}

impl StatusBus {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    /// Queue a message for the transport. Dropping on a full queue is
    /// preferable to blocking the pipeline; the writer drains fast.
    pub fn send(&self, msg: OutboundMessage) {
        match self.tx.try_send(msg) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(msg)) => {
                warn!("status bus full, dropping {:?}", kind_of(&msg));
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("status bus closed, transport writer gone");
            }
        }
    }

    pub fn status(&self, color: StatusColor, text: impl Into<String>) {
        self.send(OutboundMessage::Status {
            color,
            text: text.into(),
        });
    }

    pub fn proof_stream(&self, event: ProofStreamEvent) {
        self.send(OutboundMessage::ProofStream {
            color: StatusColor::Blue,
            event,
        });
    }

    pub fn amplitude(&self, level: u8) {
        self.send(OutboundMessage::AudioAmp(level));
    }
}

fn kind_of(msg: &OutboundMessage) -> &'static str {
    match msg {
        OutboundMessage::BackendReady => "BackendReady",
        OutboundMessage::GetConfig => "GetConfig",
        OutboundMessage::Models(_) => "Models",
        OutboundMessage::ModelSelected { .. } => "ModelSelected",
        OutboundMessage::State(_) => "State",
        OutboundMessage::Status { .. } => "Status",
        OutboundMessage::ProofStream { .. } => "ProofStream",
        OutboundMessage::AudioAmp(_) => "AudioAmp",
        OutboundMessage::FinalTranscript(_) => "FinalTranscript",
        OutboundMessage::DictationPreview(_) => "DictationPreview",
        OutboundMessage::Transcription { .. } => "Transcription",
        OutboundMessage::VocabResponse { .. } => "VocabResponse",
        OutboundMessage::ShutdownSignal => "ShutdownSignal",
        OutboundMessage::ShutdownFinalized => "ShutdownFinalized",
    }
}

/// Last-line-of-defence rate limiter for amplitude messages. The recorder
/// already downsamples; this keeps the transport invariant even if an
/// upstream producer misbehaves.
#[derive(Debug)]
pub(crate) struct AmpRateLimiter {
    min_interval: Duration,
    last: Option<Instant>,
}

impl AmpRateLimiter {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        match self.last {
            Some(prev) if now.duration_since(prev) < self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Spawn the single transport writer. One message per line; the writer is
/// the only task ever touching the output stream.
pub fn spawn_transport_writer<W>(
    mut rx: mpsc::Receiver<OutboundMessage>,
    mut writer: W,
) -> JoinHandle<()>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut amp_limiter = AmpRateLimiter::new(AMP_MIN_INTERVAL);
        while let Some(msg) = rx.recv().await {
            if matches!(msg, OutboundMessage::AudioAmp(_)) && !amp_limiter.allow(Instant::now()) {
                continue;
            }
            let mut line = msg.encode();
            line.push('\n');
            if let Err(e) = writer.write_all(line.as_bytes()).await {
                warn!("transport write failed, stopping writer: {}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                warn!("transport flush failed, stopping writer: {}", e);
                break;
            }
        }
        debug!("transport writer finished");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, BufReader};

    #[test]
    fn amp_limiter_enforces_interval() {
        let mut limiter = AmpRateLimiter::new(Duration::from_millis(34));
        let t0 = Instant::now();
        assert!(limiter.allow(t0));
        assert!(!limiter.allow(t0 + Duration::from_millis(10)));
        assert!(!limiter.allow(t0 + Duration::from_millis(33)));
        assert!(limiter.allow(t0 + Duration::from_millis(34)));
        assert!(!limiter.allow(t0 + Duration::from_millis(40)));
    }

    #[test]
    fn amp_limiter_caps_at_thirty_hz() {
        let mut limiter = AmpRateLimiter::new(Duration::from_millis(34));
        let t0 = Instant::now();
        let mut allowed = 0;
        // One synthetic second of 100 Hz updates.
        for ms in (0..1000).step_by(10) {
            if limiter.allow(t0 + Duration::from_millis(ms)) {
                allowed += 1;
            }
        }
        assert!(allowed <= 30, "allowed {allowed} amplitude messages");
    }

    #[tokio::test]
    async fn writer_emits_one_message_per_line() {
        let (bus, rx) = StatusBus::new(16);
        let (tx_side, rx_side) = tokio::io::duplex(4096);
        let handle = spawn_transport_writer(rx, tx_side);

        bus.send(OutboundMessage::BackendReady);
        bus.status(StatusColor::Blue, "Listening for activation words...");
        bus.proof_stream(ProofStreamEvent::Chunk("- A.\n".into()));
        drop(bus);
        handle.await.unwrap();

        let mut lines = BufReader::new(rx_side).lines();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "PYTHON_BACKEND_READY");
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "STATUS:blue:Listening for activation words..."
        );
        assert_eq!(
            lines.next_line().await.unwrap().unwrap(),
            "STATUS:blue:PROOF_STREAM:chunk:- A.\\n"
        );
        assert!(lines.next_line().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn non_amp_messages_are_never_rate_limited() {
        let (bus, rx) = StatusBus::new(64);
        let (tx_side, rx_side) = tokio::io::duplex(16384);
        let handle = spawn_transport_writer(rx, tx_side);

        for i in 0..20 {
            bus.status(StatusColor::Green, format!("status {i}"));
        }
        drop(bus);
        handle.await.unwrap();

        let mut lines = BufReader::new(rx_side).lines();
        let mut count = 0;
        while let Some(_line) = lines.next_line().await.unwrap() {
            count += 1;
        }
        assert_eq!(count, 20);
    }
}
