use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::anyhow;
use folio_core::config::CallSettings;
use folio_engine::traits::{CallClient, CallClientFactory, CallEvent, CallTokenProvider};
use folio_providers::call_socket::{
    CallSocketConfig, CallSocketEvent, CallSocketHandle, spawn_call_socket,
};
use folio_providers::create_call::{
    CreateCallRequest, CreateCallResponse, build_create_call_request, parse_create_call_response,
};
use folio_providers::parse::error_body_text;
use tokio::sync::mpsc;

/// Fetches call tokens from the create-call endpoint.
#[derive(Debug, Clone)]
pub struct HttpCallTokenProvider {
    url: String,
}

impl HttpCallTokenProvider {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait::async_trait]
impl CallTokenProvider for HttpCallTokenProvider {
    async fn create_call(&self, req: &CreateCallRequest) -> anyhow::Result<CreateCallResponse> {
        let http = build_create_call_request(&self.url, req)?;
        let resp = folio_providers::runtime::execute(&http).await?;

        if !resp.is_success() {
            return Err(anyhow!(
                "create-call request failed: status={} body={}",
                resp.status,
                error_body_text(&resp.body)
            ));
        }

        parse_create_call_response(&resp.body)
    }
}

type Listeners = Arc<Mutex<Vec<mpsc::UnboundedSender<CallEvent>>>>;

/// Call client backed by the realtime WebSocket transport.
pub struct WsCallClient {
    cfg: CallSocketConfig,
    listeners: Listeners,
    active: tokio::sync::Mutex<Option<CallSocketHandle>>,
}

impl WsCallClient {
    pub fn new(cfg: CallSocketConfig) -> Self {
        Self {
            cfg,
            listeners: Arc::new(Mutex::new(Vec::new())),
            active: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl CallClient for WsCallClient {
    fn register_listener(&self, listener: mpsc::UnboundedSender<CallEvent>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    async fn start_call(&self, access_token: &str) -> anyhow::Result<()> {
        let mut active = self.active.lock().await;
        if let Some(old) = active.take() {
            old.shutdown().await;
        }

        let (handle, mut events) = spawn_call_socket(self.cfg.clone(), access_token).await?;
        *active = Some(handle);

        let listeners = self.listeners.clone();
        tokio::spawn(async move {
            while let Some(evt) = events.recv().await {
                let evt = to_call_event(evt);
                listeners
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .retain(|l| l.send(evt.clone()).is_ok());
            }
        });
        Ok(())
    }

    async fn stop_call(&self) {
        if let Some(handle) = self.active.lock().await.take() {
            handle.shutdown().await;
        }
    }
}

fn to_call_event(evt: CallSocketEvent) -> CallEvent {
    match evt {
        CallSocketEvent::CallStarted => CallEvent::CallStarted,
        CallSocketEvent::AgentStartTalking => CallEvent::AgentStartTalking,
        CallSocketEvent::AgentStopTalking => CallEvent::AgentStopTalking,
        CallSocketEvent::Update { transcript } => CallEvent::Update(transcript),
        CallSocketEvent::Metadata { metadata } => CallEvent::Metadata(metadata),
        CallSocketEvent::CallEnded => CallEvent::CallEnded,
        CallSocketEvent::Error { message } => CallEvent::Error(message),
    }
}

pub struct WsCallClientFactory {
    cfg: CallSocketConfig,
}

impl WsCallClientFactory {
    pub fn from_settings(settings: &CallSettings) -> anyhow::Result<Self> {
        let cfg = CallSocketConfig::new(
            &settings.call_ws_url,
            Duration::from_millis(settings.connect_timeout_ms),
        )?;
        Ok(Self { cfg })
    }
}

impl CallClientFactory for WsCallClientFactory {
    fn create(&self) -> Arc<dyn CallClient> {
        Arc::new(WsCallClient::new(self.cfg.clone()))
    }
}
