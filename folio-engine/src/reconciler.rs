use folio_core::transcript::merge_update_window;
use folio_core::types::{Role, TranscriptEntry};
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

/// The canonical conversation transcript.
///
/// Every mutation happens under one lock, so merges never overlap. Arrival
/// order is the order of `submit_*` calls: the engine feeds windows from a
/// single task reading the session's FIFO event channel. Every change is
/// published as a full snapshot.
#[derive(Clone)]
pub struct TranscriptReconciler {
    inner: Arc<Mutex<Vec<TranscriptEntry>>>,
    tx: Arc<watch::Sender<Vec<TranscriptEntry>>>,
}

impl Default for TranscriptReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptReconciler {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            inner: Arc::new(Mutex::new(Vec::new())),
            tx: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<TranscriptEntry>> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Vec<TranscriptEntry> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Validate a raw `update` payload and merge it.
    ///
    /// Anything that is not an array of `{role, content}` entries is dropped.
    pub fn submit_payload(&self, payload: &Value) {
        match serde_json::from_value::<Vec<TranscriptEntry>>(payload.clone()) {
            Ok(window) => self.submit_window(window),
            Err(e) => log::debug!("dropping malformed update window: {e}"),
        }
    }

    pub fn submit_window(&self, window: Vec<TranscriptEntry>) {
        if window.is_empty() {
            log::debug!("ignoring empty update window");
            return;
        }

        let mut transcript = self.lock();
        let merged = merge_update_window(&transcript, &window);
        *transcript = merged;
        self.publish(&transcript);
    }

    pub fn append(&self, entry: TranscriptEntry) {
        let mut transcript = self.lock();
        transcript.push(entry);
        self.publish(&transcript);
    }

    /// Overwrite the in-progress assistant reply at the tail.
    pub fn replace_streaming_tail(&self, content: &str) {
        let mut transcript = self.lock();
        if let Some(last) = transcript
            .last_mut()
            .filter(|e| e.role == Role::Agent)
        {
            content.clone_into(&mut last.content);
        } else {
            log::warn!("streaming tail is not an agent entry; appending a new one");
            transcript.push(TranscriptEntry::agent(content));
        }
        self.publish(&transcript);
    }

    pub fn reset(&self) {
        let mut transcript = self.lock();
        transcript.clear();
        self.publish(&transcript);
    }

    fn publish(&self, transcript: &[TranscriptEntry]) {
        self.tx.send_replace(transcript.to_vec());
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TranscriptEntry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
