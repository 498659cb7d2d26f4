use crate::request::HttpRequest;
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCallRequest {
    pub agent_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retell_llm_dynamic_variables: Option<BTreeMap<String, String>>,
}

impl CreateCallRequest {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            metadata: None,
            retell_llm_dynamic_variables: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn with_dynamic_variables(mut self, vars: BTreeMap<String, String>) -> Self {
        // An empty map is omitted from the payload entirely.
        self.retell_llm_dynamic_variables = (!vars.is_empty()).then_some(vars);
        self
    }
}

/// Response of the create-call endpoint.
///
/// Both fields are optional on the wire so that a 2xx without a token can be
/// told apart from a response that failed to decode.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct CreateCallResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub call_id: Option<String>,
}

impl std::fmt::Debug for CreateCallResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CreateCallResponse")
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("call_id", &self.call_id)
            .finish()
    }
}

pub fn build_create_call_request(
    url: &str,
    body: &CreateCallRequest,
) -> anyhow::Result<HttpRequest> {
    if body.agent_id.trim().is_empty() {
        return Err(anyhow!("agent_id is required"));
    }
    let json = serde_json::to_string(body).context("encode create-call JSON")?;
    Ok(HttpRequest::post_json(url, json))
}

pub fn parse_create_call_response(body: &[u8]) -> anyhow::Result<CreateCallResponse> {
    serde_json::from_slice(body).context("decode create-call JSON")
}
