use std::time::Duration;

use anyhow::{Context, anyhow};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, client::IntoClientRequest};
use url::Url;

const WS_SEND_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSocketConfig {
    pub ws_url: Url,
    pub connect_timeout: Duration,
}

impl CallSocketConfig {
    pub fn new(ws_url: &str, connect_timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            ws_url: Url::parse(ws_url).context("parse call websocket url")?,
            connect_timeout,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallSocketEvent {
    CallStarted,
    AgentStartTalking,
    AgentStopTalking,
    /// Raw transcript window; validated further up.
    Update { transcript: Value },
    Metadata { metadata: Value },
    CallEnded,
    Error { message: String },
}

#[derive(Debug)]
enum CallCmd {
    Shutdown,
}

#[derive(Clone)]
pub struct CallSocketHandle {
    tx: mpsc::Sender<CallCmd>,
}

impl CallSocketHandle {
    pub async fn shutdown(&self) {
        let _ = self.tx.send(CallCmd::Shutdown).await;
    }
}

/// Open the call's realtime socket and spawn its actor.
///
/// Emits `CallStarted` once the handshake succeeds. The event stream always
/// ends with either `CallEnded` or `Error`.
pub async fn spawn_call_socket(
    cfg: CallSocketConfig,
    access_token: &str,
) -> anyhow::Result<(CallSocketHandle, mpsc::Receiver<CallSocketEvent>)> {
    if access_token.trim().is_empty() {
        return Err(anyhow!("missing call access token"));
    }

    let mut req = cfg
        .ws_url
        .as_str()
        .into_client_request()
        .context("build websocket request")?;
    req.headers_mut().insert(
        "Authorization",
        format!("Bearer {access_token}")
            .parse()
            .map_err(|_| anyhow!("invalid call access token header"))?,
    );

    let (cmd_tx, mut cmd_rx) = mpsc::channel::<CallCmd>(8);
    let (evt_tx, evt_rx) = mpsc::channel::<CallSocketEvent>(64);

    let (ws, _resp) = tokio::time::timeout(cfg.connect_timeout, tokio_tungstenite::connect_async(req))
        .await
        .map_err(|_| anyhow!("call websocket connect timed out"))?
        .context("connect call websocket")?;

    let (ws_write, mut ws_read) = ws.split();

    // Writer task so pongs never block reads.
    let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);
    tokio::spawn(async move {
        let mut ws_write = ws_write;
        while let Some(msg) = out_rx.recv().await {
            let res = tokio::time::timeout(WS_SEND_TIMEOUT, ws_write.send(msg)).await;
            if !matches!(res, Ok(Ok(()))) {
                break;
            }
        }
        let _ = ws_write.send(Message::Close(None)).await;
    });

    let _ = evt_tx.send(CallSocketEvent::CallStarted).await;

    tokio::spawn(async move {
        let mut ended = false;

        loop {
            tokio::select! {
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(CallCmd::Shutdown) | None => break,
                    }
                }

                msg = ws_read.next() => {
                    let Some(msg) = msg else { break; };
                    let msg = match msg {
                        Ok(m) => m,
                        Err(e) => {
                            log::warn!("call socket read failed: {e}");
                            let _ = evt_tx.send(CallSocketEvent::Error { message: "websocket read failed".into() }).await;
                            ended = true;
                            break;
                        }
                    };

                    let text = match msg {
                        Message::Text(t) => t.to_string(),
                        Message::Binary(b) => String::from_utf8_lossy(&b).to_string(),
                        Message::Close(_) => break,
                        Message::Ping(p) => {
                            if out_tx.try_send(Message::Pong(p)).is_err() {
                                let _ = evt_tx.send(CallSocketEvent::Error { message: "failed to send pong".into() }).await;
                                ended = true;
                                break;
                            }
                            continue;
                        }
                        _ => continue,
                    };

                    match parse_call_message(&text) {
                        Ok(evt) => {
                            let last = matches!(evt, CallSocketEvent::CallEnded | CallSocketEvent::Error { .. });
                            let _ = evt_tx.send(evt).await;
                            if last {
                                ended = true;
                                break;
                            }
                        }
                        Err(e) => log::debug!("ignoring call frame: {e:#}"),
                    }
                }
            }
        }

        if !ended {
            let _ = evt_tx.send(CallSocketEvent::CallEnded).await;
        }
        // Dropping `out_tx` ends the writer task, which sends Close.
    });

    Ok((CallSocketHandle { tx: cmd_tx }, evt_rx))
}

fn parse_call_message(s: &str) -> anyhow::Result<CallSocketEvent> {
    let mut v: Value = serde_json::from_str(s).context("decode call frame")?;
    let t = v
        .get("event_type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow!("missing event_type"))?
        .to_string();

    match t.as_str() {
        "update" => Ok(CallSocketEvent::Update {
            transcript: v
                .get_mut("transcript")
                .map(Value::take)
                .ok_or_else(|| anyhow!("update without transcript"))?,
        }),
        "metadata" => Ok(CallSocketEvent::Metadata {
            metadata: v
                .get_mut("metadata")
                .map(Value::take)
                .ok_or_else(|| anyhow!("metadata without payload"))?,
        }),
        "agent_start_talking" => Ok(CallSocketEvent::AgentStartTalking),
        "agent_stop_talking" => Ok(CallSocketEvent::AgentStopTalking),
        "call_ended" => Ok(CallSocketEvent::CallEnded),
        "error" => {
            let message = v
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("call error")
                .to_string();
            Ok(CallSocketEvent::Error { message })
        }
        other => Err(anyhow!("unknown event_type: {other}")),
    }
}
