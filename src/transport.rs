//! HTTP transport used by the fetcher
//!
//! The cache engine talks to the resolver through the [`Transport`] trait so
//! tests can substitute a scripted fake. [`HttpTransport`] is the real
//! implementation; it owns timeouts and the retry policy.

use std::io::Read;
use std::thread;

use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::config::HttpConfig;
use crate::error::TransportError;

/// A completed HTTP exchange
///
/// The body is left unread so callers can skip it for error statuses.
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body stream
    pub body: Box<dyn Read>,
}

impl Response {
    pub fn new(status: u16, body: impl Read + 'static) -> Self {
        Self {
            status,
            body: Box::new(body),
        }
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response").field("status", &self.status).finish_non_exhaustive()
    }
}

/// Something that can perform an HTTP GET
pub trait Transport {
    /// Requests `url` and returns the response once headers have arrived
    ///
    /// Errors mean no response was obtained (DNS, connect, timeout). Any
    /// status code, including 4xx and 5xx, is a successful exchange.
    fn get(&self, url: &str) -> Result<Response, TransportError>;
}

/// Blocking reqwest client with linear-backoff retries
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpConfig,
}

impl HttpTransport {
    /// Builds the client from `config`
    pub fn new(config: HttpConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &str) -> Result<Response, TransportError> {
        let mut attempt: u32 = 0;
        loop {
            let retries_left = attempt < self.config.max_retries;
            match self.client.get(url).send() {
                Ok(response) if retries_left && is_retryable_status(response.status()) => {
                    tracing::warn!(url, status = %response.status(), attempt, "retrying request");
                }
                Ok(response) => {
                    return Ok(Response::new(response.status().as_u16(), response));
                }
                Err(err) if retries_left && !err.is_builder() => {
                    tracing::warn!(url, error = %err, attempt, "retrying request");
                }
                Err(err) => return Err(err.into()),
            }
            attempt += 1;
            thread::sleep(self.config.backoff * attempt);
        }
    }
}

/// Statuses worth another attempt: rate limiting and server errors
fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}
