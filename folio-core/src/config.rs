use crate::types::Page;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub call: CallSettings,
    #[serde(default)]
    pub chat: ChatSettings,

    // Page shown before the agent navigates anywhere.
    #[serde(default)]
    pub initial_page: Page,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallSettings {
    // Required to start a call; absence is reported at call start, not at load.
    #[serde(default)]
    pub agent_id: Option<String>,
    pub create_call_url: String,
    pub call_ws_url: String,
    #[serde(default = "default_platform")]
    pub platform: String,
    #[serde(default)]
    pub dynamic_variables: BTreeMap<String, String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    pub chat_url: String,
    pub summary_url: String,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            agent_id: None,
            create_call_url: "http://localhost:3000/api/create-web-call".into(),
            call_ws_url: "ws://localhost:8080/call".into(),
            platform: default_platform(),
            dynamic_variables: BTreeMap::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            chat_url: "http://localhost:8080/chat".into(),
            summary_url: "http://localhost:8080/summary".into(),
        }
    }
}

impl CallSettings {
    /// The agent id, if present and non-blank.
    pub fn agent_id(&self) -> Option<&str> {
        self.agent_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn default_platform() -> String {
    "web".into()
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}
