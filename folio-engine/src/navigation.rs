use folio_core::navigation::{NavigationError, NavigationState, resolve_navigation};
use folio_core::types::{NavigationMeta, Page};
use std::sync::Arc;
use tokio::sync::watch;

/// Turns metadata events from the call or the chat stream into page changes.
#[derive(Clone)]
pub struct NavigationRouter {
    tx: Arc<watch::Sender<NavigationState>>,
}

impl NavigationRouter {
    pub fn new(initial: Page) -> Self {
        let (tx, _rx) = watch::channel(NavigationState::new(initial));
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> NavigationState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<NavigationState> {
        self.tx.subscribe()
    }

    /// Returns whether the active page or project changed.
    pub fn apply(&self, meta: &NavigationMeta) -> bool {
        let cmd = match resolve_navigation(meta) {
            Ok(cmd) => cmd,
            Err(NavigationError::NotNavigation(kind)) => {
                log::debug!("ignoring metadata of type {kind:?}");
                return false;
            }
            Err(e) => {
                log::warn!("ignoring navigation: {e}");
                return false;
            }
        };

        let changed = self.tx.send_if_modified(|state| state.apply(&cmd));
        if changed {
            let state = self.tx.borrow();
            log::info!(
                "navigated to {} (project: {:?})",
                state.page,
                state.project_id
            );
        }
        changed
    }
}
