//! Real HTTP transport using reqwest.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use tracing::debug;

use super::{BoxFuture, Method, Request, Response, Transport, TransportError};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport backed by an async reqwest client.
///
/// Cookies persist across calls and gzip/deflate bodies are decompressed
/// transparently.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the given request timeout.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Self::with_default_headers(timeout, &[])
    }

    /// Creates a transport that adds `headers` to every request.
    pub fn with_default_headers(
        timeout: Duration,
        headers: &[(&str, &str)],
    ) -> Result<Self, TransportError> {
        let mut defaults = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Client(format!("invalid header name: {}", e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Client(format!("invalid header value: {}", e)))?;
            defaults.insert(name, value);
        }

        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .gzip(true)
            .deflate(true)
            .default_headers(defaults)
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self { client, timeout })
    }

    /// Creates a transport with the default 30 second timeout.
    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// The configured request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn map_error(url: &str, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout {
                url: url.to_string(),
            }
        } else {
            TransportError::Request {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

impl Transport for ReqwestTransport {
    fn send(&self, request: Request) -> BoxFuture<'_, Result<Response, TransportError>> {
        Box::pin(async move {
            let Request {
                method,
                url,
                headers,
                form,
            } = request;

            debug!(method = method.as_str(), url = %url, "Sending request");

            let mut builder = self.client.request(to_reqwest_method(method), &url);
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(form) = &form {
                builder = builder.form(form);
            }

            let response = builder.send().await.map_err(|e| Self::map_error(&url, e))?;

            let status = response.status().as_u16();
            let headers: HashMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();

            let body = response
                .bytes()
                .await
                .map_err(|e| Self::map_error(&url, e))?;

            debug!(url = %url, status, bytes = body.len(), "Received response");

            Ok(Response {
                status,
                headers,
                body,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_creation() {
        let transport = ReqwestTransport::with_defaults().unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_transport_with_default_headers() {
        let transport =
            ReqwestTransport::with_default_headers(Duration::from_secs(5), &[("User-Agent", "bf")]);
        assert!(transport.is_ok());
    }

    #[test]
    fn test_transport_rejects_invalid_header_name() {
        let result =
            ReqwestTransport::with_default_headers(Duration::from_secs(5), &[("bad header", "x")]);
        assert!(matches!(result, Err(TransportError::Client(_))));
    }

    #[test]
    fn test_method_mapping() {
        assert_eq!(to_reqwest_method(Method::Get), reqwest::Method::GET);
        assert_eq!(to_reqwest_method(Method::Patch), reqwest::Method::PATCH);
    }
}
