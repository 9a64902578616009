//! HTTP transport abstraction.
//!
//! Everything in this crate talks to the network through the [`Transport`]
//! trait so that tests can substitute a scripted transport and so a content
//! cache can be layered over any implementation (see
//! [`CachingTransport`](crate::cache::CachingTransport)).

mod http;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

pub use http::ReqwestTransport;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised while talking to the network.
///
/// These are never retried by this crate; callers own retry policy.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The request could not be sent or the response body could not be read.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request timed out.
    #[error("request to {url} timed out")]
    Timeout { url: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// The HTTP client could not be constructed.
    #[error("failed to create HTTP client: {0}")]
    Client(String),
}

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case method name as sent on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// Per-request headers, sent in addition to the transport's defaults.
    pub headers: Vec<(String, String)>,
    /// URL-encoded form body.
    pub form: Option<Vec<(String, String)>>,
}

impl Request {
    /// A bare GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            form: None,
        }
    }

    /// A POST request carrying a form body.
    pub fn post_form(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            headers: Vec::new(),
            form: Some(form),
        }
    }

    /// Add a header to this request.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Value of a form field.
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .as_ref()?
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A fully received response.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Response headers with lower-cased names.
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl Response {
    /// A `200 OK` response with no headers.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success status into [`TransportError::Status`].
    pub fn error_for_status(self, url: &str) -> Result<Self, TransportError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(TransportError::Status {
                url: url.to_string(),
                status: self.status,
            })
        }
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for HTTP operations.
///
/// Implementations must keep cookies across calls and transparently undo
/// standard HTTP content encodings (gzip, deflate).
pub trait Transport: Send + Sync {
    /// Send a request and receive the whole response.
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        (**self).send(request)
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let request = Request::get("http://example.com").with_header("Authorization", "bearer x");
        assert_eq!(request.header("authorization"), Some("bearer x"));
        assert_eq!(request.header("accept"), None);
    }

    #[test]
    fn test_request_form_value() {
        let request = Request::post_form(
            "http://example.com/token",
            vec![("grant_type".to_string(), "client_credentials".to_string())],
        );
        assert_eq!(request.method, Method::Post);
        assert_eq!(request.form_value("grant_type"), Some("client_credentials"));
        assert_eq!(request.form_value("missing"), None);
        assert_eq!(Request::get("http://x").form_value("grant_type"), None);
    }

    #[test]
    fn test_error_for_status() {
        assert!(Response::ok("body").error_for_status("http://x").is_ok());

        let response = Response {
            status: 403,
            headers: HashMap::new(),
            body: Bytes::new(),
        };
        let err = response.error_for_status("http://x").unwrap_err();
        assert!(matches!(err, TransportError::Status { status: 403, .. }));
        assert_eq!(err.to_string(), "HTTP 403 from http://x");
    }

    #[tokio::test]
    async fn test_mock_transport_routes_and_records() {
        let mock = MockTransport::new();
        mock.route("http://example.com/a", 200, "hello");

        let hit = mock.send(Request::get("http://example.com/a")).await.unwrap();
        assert_eq!(hit.status, 200);
        assert_eq!(hit.text(), "hello");

        let miss = mock.send(Request::get("http://example.com/b")).await.unwrap();
        assert_eq!(miss.status, 404);

        assert_eq!(mock.calls_to("http://example.com/a"), 1);
        assert_eq!(mock.requests().len(), 2);
    }
}
