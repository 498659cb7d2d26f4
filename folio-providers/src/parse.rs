use anyhow::{Context, anyhow};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

pub fn parse_summary_response(body: &[u8]) -> anyhow::Result<String> {
    let resp: SummaryResponse = serde_json::from_slice(body).context("decode summary JSON")?;
    if let Some(err) = resp.error {
        return Err(anyhow!("summary failed: {err}"));
    }
    resp.summary
        .ok_or_else(|| anyhow!("no summary in response"))
}

/// Best-effort text for a failed response, preferring a JSON `error` field.
pub fn error_body_text(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(e) => e.error,
        Err(_) => String::from_utf8_lossy(body).trim().to_string(),
    }
}
