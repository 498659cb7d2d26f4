use std::sync::Arc;

use folio_core::config::AppConfig;
use folio_engine::engine::{EngineDeps, PortfolioEngine};
use folio_engine::error::Notifier;

use crate::call::{HttpCallTokenProvider, WsCallClientFactory};
use crate::chat::HttpChatBackend;

/// Build a runnable engine from config, wired to the HTTP and WebSocket
/// backends. Must be called inside a tokio runtime.
///
/// A missing agent id is not an error here; it surfaces when a call starts.
pub fn build_engine_from_config(
    cfg: &AppConfig,
    notifier: Arc<dyn Notifier>,
) -> anyhow::Result<PortfolioEngine> {
    let call_factory = Arc::new(WsCallClientFactory::from_settings(&cfg.call)?);
    let call_tokens = Arc::new(HttpCallTokenProvider::new(cfg.call.create_call_url.clone()));
    let chat = Arc::new(HttpChatBackend::new(&cfg.chat));

    Ok(PortfolioEngine::new(
        cfg,
        EngineDeps {
            call_factory,
            call_tokens,
            chat,
            notifier,
        },
    ))
}
