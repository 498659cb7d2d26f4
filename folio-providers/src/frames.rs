//! Framing for the streamed chat reply.
//!
//! The chat endpoint answers with server-sent events; every `data:` line
//! carries one JSON frame. Chunks from the network can split a line anywhere,
//! including inside a multi-byte character, so bytes are buffered until a
//! full line is available.

use anyhow::{Context, anyhow};
use folio_core::types::NavigationMeta;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatFrame {
    /// Next fragment of the reply text.
    Content(String),
    Metadata(NavigationMeta),
    Error(String),
    Done,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawFrame {
    Content {
        content: String,
    },
    Metadata {
        metadata: NavigationMeta,
    },
    Error {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
    Done,
}

pub fn parse_chat_frame(data: &str) -> anyhow::Result<ChatFrame> {
    let raw: RawFrame = serde_json::from_str(data).context("decode chat frame")?;
    Ok(match raw {
        RawFrame::Content { content } => ChatFrame::Content(content),
        RawFrame::Metadata { metadata } => ChatFrame::Metadata(metadata),
        RawFrame::Error { content, message } => {
            let msg = content
                .or(message)
                .ok_or_else(|| anyhow!("error frame without message"))?;
            ChatFrame::Error(msg)
        }
        RawFrame::Done => ChatFrame::Done,
    })
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the payloads of every `data:` line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut out = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            if let Some(data) = data_payload(&line[..line.len() - 1]) {
                out.push(data);
            }
        }
        out
    }

    /// Flush a trailing line that never got its newline.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        data_payload(&rest)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches('\r');
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data.is_empty() {
        return None;
    }
    Some(data.to_string())
}
