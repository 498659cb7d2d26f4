use async_trait::async_trait;
use folio_providers::chat::ChatMessage;
use folio_providers::create_call::{CreateCallRequest, CreateCallResponse};
use folio_providers::runtime::ByteStream;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Raw events from the vendor call client, before any validation.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    CallStarted,
    AgentStartTalking,
    AgentStopTalking,
    Update(Value),
    Metadata(Value),
    CallEnded,
    Error(String),
}

#[async_trait]
pub trait CallClient: Send + Sync {
    /// Events of every later call go to `listener`.
    fn register_listener(&self, listener: mpsc::UnboundedSender<CallEvent>);
    async fn start_call(&self, access_token: &str) -> anyhow::Result<()>;
    async fn stop_call(&self);
}

pub trait CallClientFactory: Send + Sync {
    fn create(&self) -> Arc<dyn CallClient>;
}

#[async_trait]
pub trait CallTokenProvider: Send + Sync {
    async fn create_call(&self, req: &CreateCallRequest) -> anyhow::Result<CreateCallResponse>;
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Opens the streamed reply. Non-2xx responses are errors.
    async fn stream_chat(&self, messages: &[ChatMessage]) -> anyhow::Result<ByteStream>;
    async fn summarize(&self, transcript: &[ChatMessage]) -> anyhow::Result<String>;
}
