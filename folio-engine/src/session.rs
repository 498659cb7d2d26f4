use crate::error::ConversationError;
use crate::traits::{CallClient, CallClientFactory, CallEvent, CallTokenProvider};
use folio_core::config::CallSettings;
use folio_core::types::NavigationMeta;
use folio_providers::create_call::CreateCallRequest;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Uninitialized,
    Connecting,
    Active,
    Ended,
}

impl CallState {
    pub fn is_live(&self) -> bool {
        matches!(self, CallState::Connecting | CallState::Active)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Started,
    AgentSpeakingChanged(bool),
    /// Raw update window; the reconciler validates it.
    Update(Value),
    Metadata(NavigationMeta),
    Ended,
    Error(String),
}

struct Inner {
    state: CallState,
    // Bumped by every start attempt.
    generation: u64,
    // Attempt that last handed a token to the client.
    dialing: Option<u64>,
    listeners_registered: bool,
    subscribers: Vec<mpsc::UnboundedSender<SessionEvent>>,
}

/// Owns the single vendor call client and the lifecycle of its calls.
///
/// The client is created on the first `start()` and reused afterwards. Its
/// events are forwarded to subscribers in delivery order.
pub struct CallSession {
    settings: CallSettings,
    factory: Arc<dyn CallClientFactory>,
    tokens: Arc<dyn CallTokenProvider>,
    client: OnceLock<Arc<dyn CallClient>>,
    inner: Mutex<Inner>,
    me: Weak<CallSession>,
}

impl CallSession {
    pub fn new(
        settings: CallSettings,
        factory: Arc<dyn CallClientFactory>,
        tokens: Arc<dyn CallTokenProvider>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            settings,
            factory,
            tokens,
            client: OnceLock::new(),
            inner: Mutex::new(Inner {
                state: CallState::Uninitialized,
                generation: 0,
                dialing: None,
                listeners_registered: false,
                subscribers: Vec::new(),
            }),
            me: me.clone(),
        })
    }

    pub fn state(&self) -> CallState {
        self.lock().state
    }

    pub fn is_calling(&self) -> bool {
        self.state() == CallState::Active
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Start a new call. Ignored while another call is connecting or active.
    ///
    /// A `stop()` that lands while the call is still connecting wins: the
    /// attempt is abandoned and `Ok(())` is returned.
    ///
    /// Must be called from within a tokio runtime: the first call spawns the
    /// task that forwards client events.
    pub async fn start(&self) -> Result<(), ConversationError> {
        let attempt = {
            let mut inner = self.lock();
            if inner.state.is_live() {
                log::warn!("call start ignored: a call is already {:?}", inner.state);
                return Ok(());
            }
            if self.settings.agent_id().is_none() {
                inner.state = CallState::Ended;
                return Err(ConversationError::Configuration(
                    "agent id is not set".into(),
                ));
            }
            inner.generation += 1;
            inner.state = CallState::Connecting;
            inner.generation
        };
        log::info!("call stage: connecting");

        let client = self.client();
        self.ensure_listeners(&client);

        if let Err(e) = self.connect(client.as_ref(), attempt).await {
            log::warn!("call start failed: {e}");
            let mut inner = self.lock();
            if inner.generation == attempt {
                inner.state = CallState::Ended;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Request termination of the current call; a no-op when nothing is live.
    pub async fn stop(&self) {
        if !self.state().is_live() {
            log::debug!("call stop ignored: no live call");
            return;
        }
        if let Some(client) = self.client.get() {
            client.stop_call().await;
        }
        self.mark_ended();
    }

    fn client(&self) -> Arc<dyn CallClient> {
        self.client
            .get_or_init(|| {
                log::info!("creating call client");
                self.factory.create()
            })
            .clone()
    }

    fn ensure_listeners(&self, client: &Arc<dyn CallClient>) {
        {
            let mut inner = self.lock();
            if inner.listeners_registered {
                return;
            }
            inner.listeners_registered = true;
        }

        let (tx, mut rx) = mpsc::unbounded_channel();
        client.register_listener(tx);

        let me = self.me.clone();
        tokio::spawn(async move {
            while let Some(evt) = rx.recv().await {
                let Some(session) = me.upgrade() else {
                    break;
                };
                session.handle_client_event(evt).await;
            }
        });
    }

    async fn connect(&self, client: &dyn CallClient, attempt: u64) -> Result<(), ConversationError> {
        let agent_id = self
            .settings
            .agent_id()
            .ok_or_else(|| ConversationError::Configuration("agent id is not set".into()))?;

        let req = CreateCallRequest::new(agent_id)
            .with_metadata("session_started", unix_ms())
            .with_metadata("platform", self.settings.platform.as_str())
            .with_dynamic_variables(self.settings.dynamic_variables.clone());

        let resp = self
            .tokens
            .create_call(&req)
            .await
            .map_err(|e| ConversationError::transport(&e))?;

        let token = resp
            .access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ConversationError::Auth("no access token in create-call response".into()))?;

        {
            let mut inner = self.lock();
            if inner.generation != attempt || inner.state != CallState::Connecting {
                log::info!("call start abandoned: stopped while connecting");
                return Ok(());
            }
            inner.dialing = Some(attempt);
        }

        client
            .start_call(token)
            .await
            .map_err(|e| ConversationError::transport(&e))?;

        // A stop that raced the connect already marked the call ended, so the
        // freshly opened connection must not outlive it.
        if !self.state().is_live() {
            log::info!("call stopped while connecting; closing connection");
            client.stop_call().await;
        }
        Ok(())
    }

    async fn handle_client_event(&self, evt: CallEvent) {
        match evt {
            CallEvent::CallStarted => {
                if self.mark_active() {
                    log::info!("call stage: active");
                    self.emit(SessionEvent::Started);
                } else {
                    log::debug!("ignoring call_started: no call is connecting");
                }
            }
            // Everything below belongs to an active call. Frames the client
            // had already read when a call was stopped arrive late and are
            // dropped here so they can't leak into the next call.
            evt if !self.is_calling() => {
                log::debug!("dropping call event outside an active call: {evt:?}");
            }
            CallEvent::AgentStartTalking => self.emit(SessionEvent::AgentSpeakingChanged(true)),
            CallEvent::AgentStopTalking => self.emit(SessionEvent::AgentSpeakingChanged(false)),
            CallEvent::Update(window) => self.emit(SessionEvent::Update(window)),
            CallEvent::Metadata(raw) => match serde_json::from_value::<NavigationMeta>(raw) {
                Ok(meta) => self.emit(SessionEvent::Metadata(meta)),
                Err(e) => log::debug!("dropping call metadata: {e}"),
            },
            CallEvent::CallEnded => {
                self.mark_ended();
            }
            CallEvent::Error(message) => {
                log::warn!("call error: {message}");
                // Never leave the connection half-open behind an error.
                self.stop().await;
                self.lock().state = CallState::Ended;
                self.emit(SessionEvent::Error(message));
            }
        }
    }

    fn mark_active(&self) -> bool {
        let mut inner = self.lock();
        if inner.state != CallState::Connecting || inner.dialing != Some(inner.generation) {
            return false;
        }
        inner.state = CallState::Active;
        true
    }

    fn mark_ended(&self) -> bool {
        {
            let mut inner = self.lock();
            if !inner.state.is_live() {
                return false;
            }
            inner.state = CallState::Ended;
        }
        log::info!("call stage: ended");
        self.emit(SessionEvent::Ended);
        true
    }

    fn emit(&self, evt: SessionEvent) {
        self.lock()
            .subscribers
            .retain(|tx| tx.send(evt.clone()).is_ok());
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn unix_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
