//! HTTP GET seam used by the manifest fetch and the fragment pool.
//!
//! The engine only sees [`Transport`]; production uses [`CurlTransport`],
//! tests substitute an in-memory fake.

mod easy;

use std::time::Duration;
use thiserror::Error;

pub use easy::CurlTransport;

/// Headers sent with every request. Some CDNs refuse requests without a
/// browser-like `User-Agent` and the page's `Referer`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeaders {
    pub user_agent: String,
    pub referer: String,
    pub origin: Option<String>,
}

impl RequestHeaders {
    /// Header lines in `Name: value` form.
    pub fn lines(&self) -> Vec<String> {
        let mut out = vec![
            format!("User-Agent: {}", self.user_agent.trim()),
            format!("Referer: {}", self.referer.trim()),
        ];
        if let Some(origin) = &self.origin {
            out.push(format!("Origin: {}", origin.trim()));
        }
        out
    }
}

/// One GET.
#[derive(Debug, Clone, Copy)]
pub struct Request<'a> {
    pub url: &'a str,
    pub headers: &'a RequestHeaders,
    /// Whole-request timeout for this attempt.
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u32,
    pub body: Vec<u8>,
}

/// Failure before a status line was obtained.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("request failed: {0}")]
    Other(String),
}

pub trait Transport: Send + Sync {
    fn get(&self, request: &Request<'_>) -> Result<Response, TransportError>;
}
