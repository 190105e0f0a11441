//! libcurl-backed transport: one Easy handle per request, body buffered in memory.

use std::time::Duration;

use super::{Request, Response, Transport, TransportError};

const MAX_REDIRECTS: u32 = 10;

#[derive(Debug, Clone, Copy)]
pub struct CurlTransport {
    connect_timeout: Duration,
}

impl CurlTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for CurlTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

impl From<curl::Error> for TransportError {
    fn from(e: curl::Error) -> Self {
        if e.is_operation_timedout() {
            return TransportError::Timeout(e.to_string());
        }
        if e.is_couldnt_connect()
            || e.is_couldnt_resolve_host()
            || e.is_couldnt_resolve_proxy()
            || e.is_read_error()
            || e.is_recv_error()
            || e.is_send_error()
            || e.is_got_nothing()
        {
            return TransportError::Connection(e.to_string());
        }
        TransportError::Other(e.to_string())
    }
}

impl Transport for CurlTransport {
    fn get(&self, request: &Request<'_>) -> Result<Response, TransportError> {
        let mut body = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(request.url)?;
        easy.follow_location(true)?;
        easy.max_redirections(MAX_REDIRECTS)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(request.timeout)?;

        let mut list = curl::easy::List::new();
        for line in request.headers.lines() {
            list.append(&line)?;
        }
        easy.http_headers(list)?;

        {
            let mut transfer = easy.transfer();
            transfer.write_function(|data| {
                body.extend_from_slice(data);
                Ok(data.len())
            })?;
            transfer.perform()?;
        }

        let status = easy.response_code()?;
        tracing::trace!(url = request.url, status, size = body.len(), "GET finished");
        Ok(Response { status, body })
    }
}
