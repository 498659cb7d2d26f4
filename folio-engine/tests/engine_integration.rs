use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use folio_core::config::AppConfig;
use folio_core::types::{ChatMode, Page, TranscriptEntry};
use folio_engine::chat::SendOutcome;
use folio_engine::engine::{EngineDeps, PortfolioEngine};
use folio_engine::error::{ChannelNotifier, ConversationError, Notice};
use folio_engine::traits::{
    CallClient, CallClientFactory, CallEvent, CallTokenProvider, ChatBackend,
};
use folio_providers::chat::ChatMessage;
use folio_providers::create_call::{CreateCallRequest, CreateCallResponse};
use folio_providers::runtime::ByteStream;
use serde_json::json;
use tokio::sync::{mpsc, watch};

#[derive(Default)]
struct FakeCall {
    listeners: Mutex<Vec<mpsc::UnboundedSender<CallEvent>>>,
    stops: AtomicUsize,
}

impl FakeCall {
    fn emit(&self, evt: CallEvent) {
        for l in self.listeners.lock().unwrap().iter() {
            let _ = l.send(evt.clone());
        }
    }
}

#[async_trait::async_trait]
impl CallClient for FakeCall {
    fn register_listener(&self, listener: mpsc::UnboundedSender<CallEvent>) {
        self.listeners.lock().unwrap().push(listener);
    }

    async fn start_call(&self, _access_token: &str) -> anyhow::Result<()> {
        self.emit(CallEvent::CallStarted);
        Ok(())
    }

    async fn stop_call(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.emit(CallEvent::CallEnded);
    }
}

struct FakeFactory {
    call: Arc<FakeCall>,
    created: AtomicUsize,
}

impl CallClientFactory for FakeFactory {
    fn create(&self) -> Arc<dyn CallClient> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.call.clone()
    }
}

struct FakeTokens;

#[async_trait::async_trait]
impl CallTokenProvider for FakeTokens {
    async fn create_call(&self, _req: &CreateCallRequest) -> anyhow::Result<CreateCallResponse> {
        Ok(CreateCallResponse {
            access_token: Some("tok".into()),
            call_id: Some("call_1".into()),
        })
    }
}

/// Chat backend that replays canned replies in order and records what it was
/// sent. HTTP round trips are covered in folio-runtime.
#[derive(Default)]
struct ScriptedChat {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    summaries: Mutex<VecDeque<anyhow::Result<String>>>,
    chat_requests: Mutex<Vec<Vec<ChatMessage>>>,
    summary_requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedChat {
    fn reply(&self, reply: anyhow::Result<String>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    fn summary(&self, summary: anyhow::Result<String>) {
        self.summaries.lock().unwrap().push_back(summary);
    }
}

#[async_trait::async_trait]
impl ChatBackend for ScriptedChat {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> anyhow::Result<ByteStream> {
        self.chat_requests.lock().unwrap().push(messages.to_vec());
        let body = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))?;

        // Split mid-frame so the decoder has to stitch lines back together.
        let body = Bytes::from(body);
        let mid = body.len() / 2;
        let chunks: Vec<anyhow::Result<Bytes>> = vec![Ok(body.slice(..mid)), Ok(body.slice(mid..))];
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }

    async fn summarize(&self, transcript: &[ChatMessage]) -> anyhow::Result<String> {
        self.summary_requests.lock().unwrap().push(transcript.to_vec());
        self.summaries
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow::anyhow!("no summary scripted")))
    }
}

struct Harness {
    engine: PortfolioEngine,
    call: Arc<FakeCall>,
    chat: Arc<ScriptedChat>,
    factory: Arc<FakeFactory>,
    notices: mpsc::UnboundedReceiver<Notice>,
}

fn harness(agent_id: Option<&str>) -> Harness {
    let mut cfg = AppConfig::default();
    cfg.call.agent_id = agent_id.map(str::to_string);

    let call = Arc::new(FakeCall::default());
    let factory = Arc::new(FakeFactory {
        call: call.clone(),
        created: AtomicUsize::new(0),
    });
    let chat = Arc::new(ScriptedChat::default());
    let (notifier, notices) = ChannelNotifier::channel();

    let engine = PortfolioEngine::new(
        &cfg,
        EngineDeps {
            call_factory: factory.clone(),
            call_tokens: Arc::new(FakeTokens),
            chat: chat.clone(),
            notifier: Arc::new(notifier),
        },
    );

    Harness {
        engine,
        call,
        chat,
        factory,
        notices,
    }
}

async fn wait_until<T: Clone>(rx: &mut watch::Receiver<T>, f: impl FnMut(&T) -> bool) -> T {
    tokio::time::timeout(Duration::from_secs(2), rx.wait_for(f))
        .await
        .expect("timed out waiting for state")
        .expect("sender dropped")
        .clone()
}

fn sse(frames: &[serde_json::Value]) -> String {
    frames
        .iter()
        .map(|f| format!("data: {f}\n\n"))
        .collect()
}

#[tokio::test]
async fn text_chat_streams_reply_and_navigates() {
    let h = harness(Some("agent_1"));
    h.chat.reply(Ok(sse(&[
        json!({"type":"content","content":"Hel"}),
        json!({"type":"content","content":"lo"}),
        json!({"type":"metadata","metadata":{"type":"navigation","page":"project","project_id":"p-7"}}),
        json!({"type":"content","content":"!"}),
        json!({"type":"done"}),
    ])));
    h.engine.set_mode(ChatMode::Text).await;

    let outcome = h.engine.send_text("Which projects?").await;
    assert_eq!(
        outcome,
        SendOutcome::Completed {
            reply: Some("Hello!".into())
        }
    );
    assert_eq!(
        h.engine.transcript(),
        vec![
            TranscriptEntry::user("Which projects?"),
            TranscriptEntry::agent("Hello!"),
        ]
    );

    let nav = h.engine.navigation();
    assert_eq!(nav.page, Page::Project);
    assert_eq!(nav.project_id.as_deref(), Some("p-7"));

    let sent = h.chat.chat_requests.lock().unwrap().clone();
    assert_eq!(
        sent,
        vec![vec![ChatMessage {
            role: "user".into(),
            content: "Which projects?".into(),
        }]]
    );
}

#[tokio::test]
async fn chat_failure_notifies_and_keeps_user_message() {
    let mut h = harness(Some("agent_1"));
    h.chat.reply(Err(anyhow::anyhow!(
        "chat request failed: status=502 body=upstream down"
    )));
    let outcome = h.engine.send_text("hello?").await;

    let SendOutcome::Failed(ConversationError::Transport(msg)) = outcome else {
        panic!("expected transport failure");
    };
    assert!(msg.contains("502"));
    assert!(msg.contains("upstream down"));
    assert_eq!(h.engine.transcript(), vec![TranscriptEntry::user("hello?")]);
    assert_eq!(
        h.notices.recv().await.unwrap(),
        Notice::error("Something went wrong. Please try again later.")
    );
}

#[tokio::test]
async fn voice_call_merges_windows_and_navigates() {
    let h = harness(Some("agent_1"));
    let mut status = h.engine.subscribe_call_status();
    let mut transcript = h.engine.subscribe_transcript();
    let mut nav = h.engine.subscribe_navigation();

    h.engine.start_call().await.unwrap();
    wait_until(&mut status, |s| s.is_calling).await;

    h.call.emit(CallEvent::AgentStartTalking);
    wait_until(&mut status, |s| s.agent_talking).await;

    h.call.emit(CallEvent::Update(json!([
        {"role":"agent","content":"Hi, I'm the portfolio guide."}
    ])));
    h.call.emit(CallEvent::Update(json!([
        {"role":"agent","content":"Hi, I'm the portfolio guide."},
        {"role":"user","content":"Where did you study?"}
    ])));
    h.call.emit(CallEvent::Update(json!("garbage")));
    h.call.emit(CallEvent::Metadata(
        json!({"type":"navigation","page":"education"}),
    ));

    let merged = wait_until(&mut transcript, |t| t.len() == 2).await;
    assert_eq!(merged[1], TranscriptEntry::user("Where did you study?"));
    let state = wait_until(&mut nav, |n| n.page == Page::Education).await;
    assert_eq!(state.project_id, None);

    h.engine.end_call().await;
    wait_until(&mut status, |s| !s.is_calling).await;
    assert_eq!(h.call.stops.load(Ordering::SeqCst), 1);

    // The transcript outlives the call until the next one starts.
    assert_eq!(h.engine.transcript().len(), 2);
}

#[tokio::test]
async fn new_call_starts_with_empty_transcript_and_reuses_client() {
    let h = harness(Some("agent_1"));
    let mut status = h.engine.subscribe_call_status();
    let mut transcript = h.engine.subscribe_transcript();

    h.engine.start_call().await.unwrap();
    wait_until(&mut status, |s| s.is_calling).await;
    h.call.emit(CallEvent::Update(json!([{"role":"agent","content":"Hello"}])));
    wait_until(&mut transcript, |t| t.len() == 1).await;
    h.engine.end_call().await;
    wait_until(&mut status, |s| !s.is_calling).await;

    h.engine.start_call().await.unwrap();
    assert!(h.engine.transcript().is_empty());
    wait_until(&mut status, |s| s.is_calling).await;

    assert_eq!(h.factory.created.load(Ordering::SeqCst), 1);
    assert_eq!(h.call.listeners.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn switching_to_text_ends_the_call() {
    let h = harness(Some("agent_1"));
    let mut status = h.engine.subscribe_call_status();

    h.engine.start_call().await.unwrap();
    wait_until(&mut status, |s| s.is_calling).await;

    h.engine.set_mode(ChatMode::Text).await;
    assert_eq!(h.call.stops.load(Ordering::SeqCst), 1);
    assert_eq!(h.engine.mode(), ChatMode::Text);
    wait_until(&mut status, |s| !s.is_calling).await;
}

#[tokio::test]
async fn call_error_stops_call_and_notifies() {
    let mut h = harness(Some("agent_1"));
    let mut status = h.engine.subscribe_call_status();

    h.engine.start_call().await.unwrap();
    wait_until(&mut status, |s| s.is_calling).await;

    h.call.emit(CallEvent::Error("websocket read failed".into()));

    let notice = tokio::time::timeout(Duration::from_secs(2), h.notices.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        notice,
        Notice::error("Something went wrong. Please try again later.")
    );
    assert_eq!(h.call.stops.load(Ordering::SeqCst), 1);
    assert!(!h.engine.call_status().is_calling);
}

#[tokio::test]
async fn missing_agent_id_reports_configuration_notice() {
    let mut h = harness(None);

    let err = h.engine.start_call().await.unwrap_err();
    assert!(matches!(err, ConversationError::Configuration(_)));
    assert_eq!(
        h.notices.recv().await.unwrap(),
        Notice::error("Voice chat is not configured right now.")
    );
    assert_eq!(h.factory.created.load(Ordering::SeqCst), 0);
    assert!(!h.engine.call_status().is_calling);
}

#[tokio::test]
async fn summary_round_trip_and_error() {
    let mut h = harness(Some("agent_1"));
    h.chat.summary(Ok("Visitor likes Rust.".into()));
    h.chat.summary(Err(anyhow::anyhow!("summary failed: Test error")));
    h.chat.reply(Err(anyhow::anyhow!("chat request failed: status=503")));
    assert_eq!(h.engine.summarize().await, Ok(None));
    assert!(h.chat.summary_requests.lock().unwrap().is_empty());

    // A failed chat still leaves the user message to summarize.
    let _ = h.engine.send_text("I like Rust").await;
    let _ = h.notices.recv().await;

    assert_eq!(
        h.engine.summarize().await,
        Ok(Some("Visitor likes Rust.".into()))
    );
    assert_eq!(
        h.chat.summary_requests.lock().unwrap()[0],
        vec![ChatMessage {
            role: "user".into(),
            content: "I like Rust".into(),
        }]
    );

    let err = h.engine.summarize().await.unwrap_err();
    let ConversationError::Transport(msg) = err else {
        panic!("expected transport error");
    };
    assert!(msg.contains("Test error"));
    assert_eq!(
        h.notices.recv().await.unwrap().message,
        "Something went wrong. Please try again later."
    );
}
