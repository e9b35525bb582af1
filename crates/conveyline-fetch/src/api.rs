//! Tax-map-key search API client

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use conveyline_core::{FetchError, SHARED_RUNTIME, http_client};

/// Request body for one page of search results
#[derive(Debug, Clone, Serialize)]
pub struct SearchRequest<'a> {
    pub offset: usize,
    pub limit: usize,
    pub query: &'a str,
    /// Free-text search, unused but expected by the endpoint
    pub search: &'a str,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str, offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            query,
            search: "",
        }
    }
}

/// Decoded search response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResponse {
    /// `data` array, `None` when the response had none
    pub data: Option<Vec<Value>>,
}

impl SearchResponse {
    pub fn from_value(value: Value) -> Self {
        let data = match value {
            Value::Object(mut map) => match map.remove("data") {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            },
            _ => None,
        };
        Self { data }
    }

    pub fn items(&self) -> &[Value] {
        self.data.as_deref().unwrap_or_default()
    }
}

/// One page of search results per call
pub trait SearchApi {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResponse, FetchError>;
}

/// `SearchApi` over HTTP: `POST {base}/{endpoint}` with a JSON body.
#[derive(Debug, Clone)]
pub struct HttpSearchClient {
    url: String,
    authorization: Option<String>,
}

impl HttpSearchClient {
    pub fn new(base_url: &str, endpoint: &str, token: Option<&str>) -> Self {
        Self {
            url: join_url(base_url, endpoint),
            authorization: token.map(bearer_header),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SearchApi for HttpSearchClient {
    fn search(&self, request: &SearchRequest<'_>) -> Result<SearchResponse, FetchError> {
        let body = serde_json::to_vec(request)?;

        SHARED_RUNTIME.handle().block_on(async {
            let mut builder = http_client()
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .body(body);
            if let Some(auth) = &self.authorization {
                builder = builder.header(AUTHORIZATION, auth);
            }

            let response = builder.send().await.map_err(FetchError::from_reqwest)?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.ok();
                return Err(FetchError::Http {
                    status: Some(status.as_u16()),
                    message: status
                        .canonical_reason()
                        .unwrap_or("unexpected status")
                        .to_string(),
                    body,
                });
            }

            let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
            let value: Value = serde_json::from_slice(&bytes)?;
            Ok(SearchResponse::from_value(value))
        })
    }
}

/// `base` + `/` + `endpoint`, without doubled slashes
fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Accept tokens with or without the scheme prefix
fn bearer_header(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}
