//! HTTP transport for the device API
//!
//! [`Transport`] is the only capability the authentication handshake and the
//! file operations need: send a request to a path relative to the device URL
//! and get a status plus body back. [`HttpTransport`] implements it over HTTPS
//! with `reqwest`, keeping cookies so the session established by `PUT /auth`
//! applies to later requests.

use std::future::Future;
use std::time::Duration;

use reqwest::{
    multipart::{Form, Part},
    Client,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Could not connect to the device: {0}. Check your network connection")]
    Connect(String),

    #[error("Device certificate is not trusted: {0}")]
    Certificate(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Request(String),

    #[error("Invalid response body: {0}")]
    InvalidBody(String),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl TransportError {
    /// Returns true if retrying later may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connect(_) | Self::Timeout(_))
    }

    /// Returns a suggestion for resolving this error
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Certificate(_) => Some(
                "Open the device API (e.g. https://digitalpaper.local:8443) in a browser and \
                 accept its certificate, or pass --accept-invalid-certs. A reply like \
                 \"error_code: 40100, message: Authentication is required.\" means the \
                 connection works.",
            ),
            Self::Connect(_) => {
                Some("Check that the device is reachable and the URL includes https:// and port 8443.")
            }
            Self::Timeout(_) => Some("The device did not answer in time; try again or raise the timeout."),
            _ => None,
        }
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        let detail = error_chain(&error);
        if mentions_certificate(&detail) {
            Self::Certificate(detail)
        } else if error.is_timeout() {
            Self::Timeout(detail)
        } else if error.is_connect() {
            Self::Connect(detail)
        } else {
            Self::Request(detail)
        }
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut detail = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

fn mentions_certificate(detail: &str) -> bool {
    let detail = detail.to_ascii_lowercase();
    detail.contains("certificate") || detail.contains("unknownissuer")
}

/// HTTP method subset used by the device API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Empty,
    Json(serde_json::Value),
    /// Single-file multipart form
    File {
        field: String,
        file_name: String,
        bytes: Vec<u8>,
    },
}

/// Request to a path relative to the device base URL
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub path: String,
    pub body: Body,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: Body::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Attach a JSON body.
    pub fn json<B: Serialize>(mut self, body: &B) -> Result<Self, TransportError> {
        self.body = Body::Json(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Attach a single file as multipart form data.
    pub fn file(
        mut self,
        field: impl Into<String>,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        self.body = Body::File {
            field: field.into(),
            file_name: file_name.into(),
            bytes,
        };
        self
    }
}

/// Response status and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TransportError> {
        serde_json::from_slice(&self.body).map_err(|e| TransportError::InvalidBody(e.to_string()))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Device error payload, when the body carries one
    pub fn device_error(&self) -> Option<DeviceError> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Error body returned by the device, e.g. `{"error_code": 40100, "message": "Authentication is required."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceError {
    pub error_code: u32,
    pub message: String,
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "error_code: {}, message: {}", self.error_code, self.message)
    }
}

/// Capability to send requests to the device
///
/// Cookies or other session state are the implementation's concern; callers
/// only see status and body.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

impl<T: Transport> Transport for &T {
    fn send(
        &self,
        request: Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send {
        (**self).send(request)
    }
}

/// HTTPS transport with a cookie store
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for the device at `base_url` (e.g. "https://digitalpaper.local:8443")
    ///
    /// `accept_invalid_certs` disables certificate verification; the device
    /// ships a self-signed certificate.
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        accept_invalid_certs: bool,
    ) -> Result<Self, TransportError> {
        let http_client = Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!("{} {}", request.method, url);

        let builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Put => self.http_client.put(&url),
            Method::Delete => self.http_client.delete(&url),
        };
        let builder = match request.body {
            Body::Empty => builder,
            Body::Json(value) => builder.json(&value),
            Body::File {
                field,
                file_name,
                bytes,
            } => builder.multipart(Form::new().part(field, Part::bytes(bytes).file_name(file_name))),
        };

        let response = builder.send().await.map_err(TransportError::from_reqwest)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(TransportError::from_reqwest)?;
        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());

        Ok(Response::new(status, body.to_vec()))
    }
}
