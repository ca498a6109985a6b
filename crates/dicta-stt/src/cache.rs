use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio::sync::OnceCell;

use dicta_foundation::Mode;

use crate::types::SttError;

/// Cache key over the PCM payload, the mode tag and the prompt digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn compute(samples: &[i16], mode: Mode, prompt: &str) -> Self {
        let mut hasher = Sha256::new();
        for &sample in samples {
            hasher.update(sample.to_le_bytes());
        }
        hasher.update([0xff]);
        hasher.update(mode.as_str().as_bytes());
        hasher.update([0xff]);
        hasher.update(Sha256::digest(prompt.as_bytes()));
        Self(hasher.finalize().into())
    }
}

/// Transcript cache with single-flight semantics: identical utterances
/// arriving concurrently trigger exactly one computation, and later callers
/// get the stored artifact.
#[derive(Default)]
pub struct UtteranceCache {
    slots: Mutex<HashMap<Fingerprint, Arc<OnceCell<String>>>>,
}

impl UtteranceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_compute<F, Fut>(
        &self,
        fingerprint: Fingerprint,
        compute: F,
    ) -> Result<String, SttError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, SttError>>,
    {
        let cell = {
            let mut slots = self.slots.lock();
            slots
                .entry(fingerprint)
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        // A failed computation leaves the cell empty so a retry can succeed.
        cell.get_or_try_init(compute).await.cloned()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    pub fn clear(&self) {
        self.slots.lock().clear();
    }
}
