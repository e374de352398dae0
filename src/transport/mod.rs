//! HTTP transport layer.
//!
//! Every network-facing component takes an injected [`HttpTransport`],
//! so tests can swap in [`MockTransport`] and assert on the exact
//! requests issued (including that none were issued at all).

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::errors::{MeliError, MeliResult, NetworkError};

/// HTTP method subset used by this crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET request.
    Get,
    /// POST request.
    Post,
}

impl HttpMethod {
    /// Canonical method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// One outgoing request.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Absolute URL.
    pub url: String,
    /// Request headers.
    pub headers: HashMap<String, String>,
    /// Raw body, when present.
    pub body: Option<String>,
    /// Per-request deadline override.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Build a GET request.
    pub fn get(url: impl Into<String>, headers: HashMap<String, String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers,
            body: None,
            timeout: None,
        }
    }

    /// Build a form-encoded POST request from `(name, value)` pairs.
    pub fn form_post(url: impl Into<String>, fields: &[(&str, &str)]) -> Self {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let mut headers = HashMap::new();
        headers.insert(
            "content-type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        headers.insert("accept".to_string(), "application/json".to_string());
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers,
            body: Some(body),
            timeout: None,
        }
    }

    /// Set a per-request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// One incoming response.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Raw body text.
    pub body: String,
}

impl HttpResponse {
    /// True for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport interface (dependency-injection seam).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request, returning the response or a network error.
    async fn send(&self, request: HttpRequest) -> MeliResult<HttpResponse>;
}

/// Production transport backed by `reqwest`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    default_timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given default deadline.
    pub fn new(timeout: Duration) -> MeliResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                MeliError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            })?;
        Ok(Self {
            client,
            default_timeout: timeout,
        })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> MeliResult<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                MeliError::Network(NetworkError::Timeout { timeout })
            } else {
                MeliError::Network(NetworkError::ConnectionFailed {
                    message: e.to_string(),
                })
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            MeliError::Network(NetworkError::ConnectionFailed {
                message: e.to_string(),
            })
        })?;

        Ok(HttpResponse { status, body })
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

/// Queued reply for [`MockTransport`]: a response or a simulated
/// transport failure.
enum MockReply {
    Response(HttpResponse),
    Error(NetworkError),
}

/// Mock transport for tests: FIFO reply queue plus a request history.
#[derive(Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    history: Mutex<Vec<HttpRequest>>,
    default_response: Mutex<Option<HttpResponse>>,
}

impl MockTransport {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a raw response.
    pub fn queue_response(&self, status: u16, body: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(MockReply::Response(HttpResponse {
                status,
                body: body.into(),
            }));
        self
    }

    /// Queue a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, status: u16, body: &T) -> &Self {
        self.queue_response(status, serde_json::to_string(body).unwrap())
    }

    /// Queue a simulated network failure.
    pub fn queue_network_error(&self, message: impl Into<String>) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(MockReply::Error(NetworkError::ConnectionFailed {
                message: message.into(),
            }));
        self
    }

    /// Response returned when the queue runs dry.
    pub fn set_default_response(&self, status: u16, body: impl Into<String>) -> &Self {
        *self.default_response.lock().unwrap() = Some(HttpResponse {
            status,
            body: body.into(),
        });
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.history.lock().unwrap().clone()
    }

    /// Number of requests sent so far.
    pub fn request_count(&self) -> usize {
        self.history.lock().unwrap().len()
    }

    /// The most recent request, if any.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.history.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> MeliResult<HttpResponse> {
        self.history.lock().unwrap().push(request);

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(MockReply::Response(response)) => Ok(response),
            Some(MockReply::Error(error)) => Err(MeliError::Network(error)),
            None => self
                .default_response
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| {
                    MeliError::Network(NetworkError::ConnectionFailed {
                        message: "no mock response queued".to_string(),
                    })
                }),
        }
    }
}

/// Percent-encode a form field per the application/x-www-form-urlencoded
/// unreserved set.
fn percent_encode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}
