/// A JSON `POST` to one of the backend endpoints. Every call the app makes
/// has this shape: create-call, chat and summary.
#[derive(Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: String,
}

// Header names containing any of these never show up in logs.
const SECRET_HEADER_MARKERS: [&str; 3] = ["authorization", "token", "key"];

fn is_secret_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    SECRET_HEADER_MARKERS.iter().any(|m| name.contains(m))
}

impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpRequest")
            .field("url", &self.url)
            .field("headers", &DebugHeaders(&self.headers))
            .field("json_bytes", &self.json.len())
            .finish()
    }
}

struct DebugHeaders<'a>(&'a [(String, String)]);

impl std::fmt::Debug for DebugHeaders<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.0.iter().map(|(name, value)| {
                let shown = if is_secret_header(name) { "<hidden>" } else { value.as_str() };
                (name, shown)
            }))
            .finish()
    }
}

impl HttpRequest {
    pub fn post_json(url: impl Into<String>, json: String) -> Self {
        Self {
            url: url.into(),
            headers: vec![("Content-Type".into(), "application/json".into())],
            json,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}
