use crate::session::CallSession;
use folio_core::types::ChatMode;
use std::sync::Arc;
use tokio::sync::watch;

/// Keeps voice and text mode mutually exclusive.
pub struct ModeController {
    session: Arc<CallSession>,
    tx: watch::Sender<ChatMode>,
}

impl ModeController {
    pub fn new(session: Arc<CallSession>) -> Self {
        let (tx, _rx) = watch::channel(ChatMode::default());
        Self { session, tx }
    }

    pub fn mode(&self) -> ChatMode {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ChatMode> {
        self.tx.subscribe()
    }

    /// Text mode tears down a live call before the switch is published.
    pub async fn set_mode(&self, mode: ChatMode) {
        if mode == ChatMode::Text && self.session.state().is_live() {
            log::info!("switching to text mode: ending the active call");
            self.session.stop().await;
        }

        if self.tx.send_if_modified(|current| {
            let changed = *current != mode;
            *current = mode;
            changed
        }) {
            log::info!("chat mode: {mode:?}");
        }
    }
}
