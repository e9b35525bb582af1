//! Transport and protocol errors for remote API calls

/// Error from a single request against a remote endpoint.
///
/// Kept separate from `anyhow` so callers can inspect the status code and
/// the response body when annotating a failed batch.
#[derive(Debug)]
pub enum FetchError {
    /// HTTP error with optional status code and response body
    Http {
        status: Option<u16>,
        message: String,
        body: Option<String>,
    },
    /// Response arrived but was not the expected JSON
    Decode(String),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
                ..
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
                ..
            } => write!(f, "HTTP error: {message}"),
            Self::Decode(msg) => write!(f, "invalid response: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for FetchError {}

impl FetchError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so bearer-protected endpoints do not end up in logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.without_url().to_string(),
            body: None,
        }
    }

    /// Status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }

    /// Response body captured from an error status, if any
    pub fn response_body(&self) -> Option<&str> {
        match self {
            Self::Http { body, .. } => body.as_deref().filter(|b| !b.is_empty()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
