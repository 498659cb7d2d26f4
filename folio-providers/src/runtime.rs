use crate::request::HttpRequest;
use anyhow::Context;
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::pin::Pin;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub type ByteStream = Pin<Box<dyn Stream<Item = anyhow::Result<Bytes>> + Send>>;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }
}

pub struct StreamingResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl std::fmt::Debug for StreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl StreamingResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Drain the body as text; used to report non-2xx responses.
    pub async fn into_text(mut self) -> anyhow::Result<String> {
        let mut out = Vec::new();
        while let Some(chunk) = self.body.next().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

pub async fn execute(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    // Without an explicit timeout a broken endpoint could hang call setup.
    let client = build_client(Some(REQUEST_TIMEOUT))?;

    let resp = build_request(&client, req)?
        .send()
        .await
        .context("http request failed")?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    Ok(HttpResponse { status, body })
}

/// Like [`execute`] but hands back the body as a stream of chunks.
///
/// Only the connection is bounded by a timeout; a stream may legitimately stay
/// open for as long as the server keeps producing.
pub async fn execute_streaming(req: &HttpRequest) -> anyhow::Result<StreamingResponse> {
    let client = build_client(None)?;

    let resp = build_request(&client, req)?
        .send()
        .await
        .context("http request failed")?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes_stream()
        .map_err(|e| anyhow::Error::new(e).context("failed reading response stream"));

    Ok(StreamingResponse {
        status,
        body: Box::pin(body),
    })
}

fn build_client(timeout: Option<Duration>) -> anyhow::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().context("build http client")
}

fn build_request(
    client: &reqwest::Client,
    req: &HttpRequest,
) -> anyhow::Result<reqwest::RequestBuilder> {
    let mut headers = HeaderMap::new();
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    Ok(client
        .post(&req.url)
        .headers(headers)
        .body(req.json.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn execute_sends_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/echo"))
            .and(header("content-type", "application/json"))
            .and(body_string(r#"{"a":1}"#))
            .respond_with(ResponseTemplate::new(201).set_body_string("ok"))
            .mount(&server)
            .await;

        let req = HttpRequest::post_json(format!("{}/echo", server.uri()), r#"{"a":1}"#.into());
        let resp = execute(&req).await.unwrap();
        assert_eq!(resp.status, 201);
        assert!(resp.is_success());
        assert_eq!(resp.body, b"ok");
    }

    #[tokio::test]
    async fn streaming_error_body_is_readable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let req = HttpRequest::post_json(format!("{}/chat", server.uri()), "{}".into());
        let resp = execute_streaming(&req).await.unwrap();
        assert_eq!(resp.status, 503);
        assert!(!resp.is_success());
        assert_eq!(resp.into_text().await.unwrap(), "overloaded");
    }

    #[tokio::test]
    async fn invalid_header_value_is_rejected_before_sending() {
        let req = HttpRequest::post_json("http://127.0.0.1:9/x", "{}".into())
            .with_header("Authorization", "Bearer bad\nvalue");
        let err = execute(&req).await.unwrap_err();
        assert!(err.to_string().contains("invalid header value for Authorization"));
    }
}
