use crate::request::HttpRequest;
use anyhow::Context;
use folio_core::types::TranscriptEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl From<&TranscriptEntry> for ChatMessage {
    fn from(entry: &TranscriptEntry) -> Self {
        Self {
            role: entry.role.wire_role().into(),
            content: entry.content.clone(),
        }
    }
}

/// Role-map a transcript into the backend's conversation history.
pub fn chat_history(entries: &[TranscriptEntry]) -> Vec<ChatMessage> {
    entries.iter().map(ChatMessage::from).collect()
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    messages: &'a [ChatMessage],
}

#[derive(Serialize)]
struct SummaryPayload<'a> {
    transcript: &'a [ChatMessage],
}

pub fn build_chat_request(url: &str, messages: &[ChatMessage]) -> anyhow::Result<HttpRequest> {
    let json = serde_json::to_string(&ChatPayload { messages }).context("encode chat JSON")?;
    Ok(HttpRequest::post_json(url, json).with_header("Accept", "text/event-stream"))
}

pub fn build_summary_request(
    url: &str,
    transcript: &[ChatMessage],
) -> anyhow::Result<HttpRequest> {
    let json =
        serde_json::to_string(&SummaryPayload { transcript }).context("encode summary JSON")?;
    Ok(HttpRequest::post_json(url, json).with_header("Accept", "application/json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_maps_agent_to_assistant() {
        let history = chat_history(&[
            TranscriptEntry::agent("Hi, ask me anything."),
            TranscriptEntry::user("What did you study?"),
        ]);
        assert_eq!(history[0].role, "assistant");
        assert_eq!(history[1].role, "user");
        assert_eq!(history[1].content, "What did you study?");
    }

    #[test]
    fn builds_streaming_chat_request() {
        let req = build_chat_request(
            "https://example.com/chat",
            &[ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
        )
        .unwrap();

        assert_eq!(req.header("accept"), Some("text/event-stream"));
        assert_eq!(
            req.json,
            r#"{"messages":[{"role":"user","content":"hi"}]}"#
        );
    }

    #[test]
    fn builds_summary_request() {
        let req = build_summary_request(
            "https://example.com/summary",
            &chat_history(&[TranscriptEntry::agent("Hello")]),
        )
        .unwrap();
        assert_eq!(
            req.json,
            r#"{"transcript":[{"role":"assistant","content":"Hello"}]}"#
        );
    }
}
