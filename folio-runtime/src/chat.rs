use anyhow::anyhow;
use folio_core::config::ChatSettings;
use folio_engine::traits::ChatBackend;
use folio_providers::chat::{ChatMessage, build_chat_request, build_summary_request};
use folio_providers::parse::{error_body_text, parse_summary_response};
use folio_providers::runtime::{ByteStream, execute, execute_streaming};

/// Chat and summary over HTTP.
#[derive(Debug, Clone)]
pub struct HttpChatBackend {
    chat_url: String,
    summary_url: String,
}

impl HttpChatBackend {
    pub fn new(settings: &ChatSettings) -> Self {
        Self {
            chat_url: settings.chat_url.clone(),
            summary_url: settings.summary_url.clone(),
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpChatBackend {
    async fn stream_chat(&self, messages: &[ChatMessage]) -> anyhow::Result<ByteStream> {
        let req = build_chat_request(&self.chat_url, messages)?;
        let resp = execute_streaming(&req).await?;

        if !resp.is_success() {
            let status = resp.status;
            let body = resp.into_text().await.unwrap_or_default();
            return Err(anyhow!(
                "chat request failed: status={status} body={}",
                body.trim()
            ));
        }
        Ok(resp.body)
    }

    async fn summarize(&self, transcript: &[ChatMessage]) -> anyhow::Result<String> {
        let req = build_summary_request(&self.summary_url, transcript)?;
        let resp = execute(&req).await?;

        if !resp.is_success() {
            return Err(anyhow!(
                "summary request failed: status={} body={}",
                resp.status,
                error_body_text(&resp.body)
            ));
        }
        parse_summary_response(&resp.body)
    }
}
