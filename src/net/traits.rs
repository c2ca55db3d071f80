//! Networking traits.

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderMap;
use url::Url;

use crate::error::Result;

/// A fully-resolved outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<serde_json::Value>,
}

/// Status and decoded body of a response.
///
/// `data` is the JSON body, `Value::String` for a non-JSON body, or
/// `Value::Null` when the body is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub data: serde_json::Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether the server rejected the presented bearer credential.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// The HTTP primitive the session layer is built on.
///
/// Any response that arrives, whatever its status, is `Ok`; `Err` is reserved
/// for transport failures (`Network`, `Timeout`).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}
