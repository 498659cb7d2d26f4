use crate::chat::{SendOutcome, TextChatDriver};
use crate::error::{ConversationError, Notice, Notifier};
use crate::mode::ModeController;
use crate::navigation::NavigationRouter;
use crate::reconciler::TranscriptReconciler;
use crate::session::{CallSession, SessionEvent};
use crate::traits::{CallClientFactory, CallTokenProvider, ChatBackend};
use folio_core::config::AppConfig;
use folio_core::navigation::NavigationState;
use folio_core::types::{ChatMode, TranscriptEntry};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CallStatus {
    pub is_calling: bool,
    pub agent_talking: bool,
}

/// Collaborators the engine talks to.
pub struct EngineDeps {
    pub call_factory: Arc<dyn CallClientFactory>,
    pub call_tokens: Arc<dyn CallTokenProvider>,
    pub chat: Arc<dyn ChatBackend>,
    pub notifier: Arc<dyn Notifier>,
}

pub struct PortfolioEngine {
    session: Arc<CallSession>,
    reconciler: TranscriptReconciler,
    router: NavigationRouter,
    chat: TextChatDriver,
    modes: ModeController,
    notifier: Arc<dyn Notifier>,
    status: Arc<watch::Sender<CallStatus>>,
}

impl PortfolioEngine {
    /// Wire up all components. Must run inside a tokio runtime.
    pub fn new(cfg: &AppConfig, deps: EngineDeps) -> Self {
        let session = CallSession::new(cfg.call.clone(), deps.call_factory, deps.call_tokens);
        let reconciler = TranscriptReconciler::new();
        let router = NavigationRouter::new(cfg.initial_page);
        let chat = TextChatDriver::new(
            deps.chat,
            reconciler.clone(),
            router.clone(),
            deps.notifier.clone(),
        );
        let modes = ModeController::new(session.clone());
        let (status, _rx) = watch::channel(CallStatus::default());
        let status = Arc::new(status);

        spawn_event_pump(
            session.subscribe(),
            reconciler.clone(),
            router.clone(),
            deps.notifier.clone(),
            status.clone(),
        );

        Self {
            session,
            reconciler,
            router,
            chat,
            modes,
            notifier: deps.notifier,
            status,
        }
    }

    /// Start a voice call with a fresh transcript.
    pub async fn start_call(&self) -> Result<(), ConversationError> {
        if self.session.state().is_live() {
            log::warn!("start_call ignored: a call is already in progress");
            return Ok(());
        }

        self.reconciler.reset();
        if let Err(e) = self.session.start().await {
            if let Some(notice) = Notice::from_error(&e) {
                self.notifier.notify(notice);
            }
            self.status.send_replace(CallStatus::default());
            return Err(e);
        }
        Ok(())
    }

    pub async fn end_call(&self) {
        self.session.stop().await;
    }

    pub async fn send_text(&self, content: &str) -> SendOutcome {
        self.chat.send_message(content).await
    }

    pub async fn set_mode(&self, mode: ChatMode) {
        self.modes.set_mode(mode).await;
    }

    pub async fn summarize(&self) -> Result<Option<String>, ConversationError> {
        self.chat.summarize().await
    }

    pub fn session(&self) -> &Arc<CallSession> {
        &self.session
    }

    pub fn transcript(&self) -> Vec<TranscriptEntry> {
        self.reconciler.snapshot()
    }

    pub fn subscribe_transcript(&self) -> watch::Receiver<Vec<TranscriptEntry>> {
        self.reconciler.subscribe()
    }

    pub fn navigation(&self) -> NavigationState {
        self.router.current()
    }

    pub fn subscribe_navigation(&self) -> watch::Receiver<NavigationState> {
        self.router.subscribe()
    }

    pub fn mode(&self) -> ChatMode {
        self.modes.mode()
    }

    pub fn subscribe_mode(&self) -> watch::Receiver<ChatMode> {
        self.modes.subscribe()
    }

    pub fn call_status(&self) -> CallStatus {
        *self.status.borrow()
    }

    pub fn subscribe_call_status(&self) -> watch::Receiver<CallStatus> {
        self.status.subscribe()
    }
}

fn spawn_event_pump(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    reconciler: TranscriptReconciler,
    router: NavigationRouter,
    notifier: Arc<dyn Notifier>,
    status: Arc<watch::Sender<CallStatus>>,
) {
    tokio::spawn(async move {
        while let Some(evt) = events.recv().await {
            match evt {
                SessionEvent::Started => {
                    status.send_modify(|s| s.is_calling = true);
                }
                SessionEvent::AgentSpeakingChanged(talking) => {
                    status.send_if_modified(|s| {
                        let changed = s.agent_talking != talking;
                        s.agent_talking = talking;
                        changed
                    });
                }
                SessionEvent::Update(window) => reconciler.submit_payload(&window),
                SessionEvent::Metadata(meta) => {
                    router.apply(&meta);
                }
                SessionEvent::Ended => {
                    status.send_replace(CallStatus::default());
                }
                SessionEvent::Error(message) => {
                    let err = ConversationError::Transport(message);
                    if let Some(notice) = Notice::from_error(&err) {
                        notifier.notify(notice);
                    }
                    status.send_replace(CallStatus::default());
                }
            }
        }
    });
}
