//! Executes plain-data requests against the network.
//!
//! # Design
//! The request layer never performs I/O; a `Transport` turns an
//! `HttpRequest` into an `HttpResponse`. Non-2xx statuses come back as data so
//! that status interpretation stays in one place. Only failures to complete
//! the exchange at all (DNS, TLS, refused connection, ...) are errors here.

use ureq::tls::TlsConfig;
use ureq::typestate::{WithBody, WithoutBody};
use ureq::{Agent, RequestBuilder};

use crate::error::OlogError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Performs one blocking HTTP round-trip.
pub trait Transport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, OlogError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, OlogError> {
        (**self).execute(request)
    }
}

/// Blocking transport backed by a pooled `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::with_verification(true)
    }

    /// `verify = false` accepts any server certificate.
    pub fn with_verification(verify: bool) -> Self {
        let agent = Agent::config_builder()
            .http_status_as_error(false)
            .tls_config(TlsConfig::builder().disable_verification(!verify).build())
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &[(String, String)]) -> RequestBuilder<B> {
    for (key, value) in headers {
        builder = builder.header(key.as_str(), value.as_str());
    }
    builder
}

fn send(builder: RequestBuilder<WithBody>, body: Option<Vec<u8>>) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(&body[..]),
        None => builder.send_empty(),
    }
}

fn call(builder: RequestBuilder<WithoutBody>) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    builder.call()
}

impl Transport for UreqTransport {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, OlogError> {
        let HttpRequest {
            method,
            url,
            headers,
            body,
        } = request;

        let result = match method {
            HttpMethod::Get => call(with_headers(self.agent.get(url.as_str()), &headers)),
            HttpMethod::Delete => call(with_headers(self.agent.delete(url.as_str()), &headers)),
            HttpMethod::Post => send(with_headers(self.agent.post(url.as_str()), &headers), body),
            HttpMethod::Put => send(with_headers(self.agent.put(url.as_str()), &headers), body),
        };
        let mut response = result.map_err(|e| OlogError::Connection(format!("{method} {url}: {e}")))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        // Attachment downloads can be arbitrarily large; lift ureq's 10 MiB cap.
        let body = response
            .body_mut()
            .with_config()
            .limit(u64::MAX)
            .read_to_vec()
            .map_err(|e| OlogError::Connection(format!("reading response from {url}: {e}")))?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
