use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dicta_foundation::Mode;
use dicta_llm::{LlmError, LlmRequest, LlmStreamEngine, LlmStreamEvent, LocalRuntimeClient};
use dicta_stt::{Fingerprint, SpeechTranscriber, SttConfig, SttError, Transcript, UtteranceCache};

/// Transcription as the controller sees it: async, cancellable, timed.
#[async_trait]
pub trait TranscriptionService: Send + Sync {
    async fn transcribe(
        &self,
        samples: Vec<i16>,
        mode: Mode,
        cancel: CancellationToken,
    ) -> Result<Transcript, SttError>;
}

/// LLM generation as the controller sees it. Stream events arrive on the
/// provided channel; the return value is the final artifact.
#[async_trait]
pub trait LlmService: Send + Sync {
    async fn generate(
        &self,
        request: LlmRequest,
        events: mpsc::Sender<LlmStreamEvent>,
        cancel: CancellationToken,
    ) -> Result<String, LlmError>;
}

/// Production transcription worker: a blocking backend on a worker thread,
/// guarded by the configured timeout and the optional fingerprint cache.
pub struct SttWorker {
    backend: Arc<Mutex<Box<dyn SpeechTranscriber>>>,
    config: SttConfig,
    cache: Option<Arc<UtteranceCache>>,
}

impl SttWorker {
    pub fn new(backend: Box<dyn SpeechTranscriber>, config: SttConfig) -> Self {
        let cache = config.cache_enabled.then(|| Arc::new(UtteranceCache::new()));
        Self {
            backend: Arc::new(Mutex::new(backend)),
            config,
            cache,
        }
    }

    async fn run_inference(&self, samples: Vec<i16>) -> Result<String, SttError> {
        let backend = self.backend.clone();
        let prompt = self.config.prompt.clone();
        tokio::task::spawn_blocking(move || {
            let mut backend = backend.lock();
            if !backend.is_loaded() {
                backend.load()?;
            }
            backend.transcribe(&samples, &prompt)
        })
        .await
        .map_err(|e| SttError::Transcription(format!("worker died: {e}")))?
    }
}

#[async_trait]
impl TranscriptionService for SttWorker {
    async fn transcribe(
        &self,
        samples: Vec<i16>,
        mode: Mode,
        cancel: CancellationToken,
    ) -> Result<Transcript, SttError> {
        let started = Instant::now();

        let text_future = async {
            match &self.cache {
                Some(cache) => {
                    let fingerprint = Fingerprint::compute(&samples, mode, &self.config.prompt);
                    cache
                        .get_or_compute(fingerprint, || self.run_inference(samples.clone()))
                        .await
                }
                None => self.run_inference(samples).await,
            }
        };

        let text = tokio::select! {
            _ = cancel.cancelled() => return Err(SttError::Cancelled),
            result = tokio::time::timeout(self.config.timeout, text_future) => {
                result.map_err(|_| SttError::Timeout(self.config.timeout))??
            }
        };

        let duration = started.elapsed();
        info!("transcription finished in {:.2}s", duration.as_secs_f32());
        Ok(Transcript { text, duration })
    }
}

/// Production LLM service over the local OpenAI-compatible runtime.
pub struct HttpLlmService {
    client: LocalRuntimeClient,
    engine: LlmStreamEngine,
}

impl HttpLlmService {
    pub fn new(client: LocalRuntimeClient, engine: LlmStreamEngine) -> Self {
        Self { client, engine }
    }
}

#[async_trait]
impl LlmService for HttpLlmService {
    async fn generate(
        &self,
        request: LlmRequest,
        events: mpsc::Sender<LlmStreamEvent>,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        let source = self.client.stream_chat(&request).await?;
        self.engine.run(&request, source, events, cancel).await
    }
}
