// src/transport.rs
use std::time::Duration;

use log::debug;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;

use crate::error::TransportError;
use crate::shutdown::ShutdownToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

/// Outcome of a request the server actually answered. `ok` is true only for
/// HTTP 200; any other status leaves the raw body for the caller to decode
/// as a structured error.
#[derive(Debug, Clone)]
pub struct Reply {
    pub ok: bool,
    pub body: String,
}

/// Issues JSON requests against a configured base address. No retries of its
/// own; bounded retry lives in `SidecarClient::connect` and nowhere else.
pub struct Transport {
    http: reqwest::Client,
    /// Separate client for the watch stream. The unary client's total-request
    /// timeout would sever a long-lived response body.
    stream_http: reqwest::Client,
    match_address: String,
    token: ShutdownToken,
}

impl Transport {
    pub fn new(
        match_address: &str,
        request_timeout: Duration,
        token: ShutdownToken,
    ) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        let stream_http = reqwest::Client::builder()
            .connect_timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            stream_http,
            match_address: match_address.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Sends one request and collects the full response body. Aborts promptly
    /// with [`TransportError::Cancelled`] when teardown is signalled, even
    /// mid-flight.
    pub async fn send(
        &self,
        base: &str,
        path: &str,
        body: &str,
        auth: Option<&str>,
        method: Method,
    ) -> Result<Reply, TransportError> {
        if self.token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }

        let url = format!("{}{}", base, path);
        let mut request = match method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Put => self.http.put(&url),
            Method::Delete => self.http.delete(&url),
        };
        request = request
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_owned());

        // Credentials only ever go to the matchmaking service, never to the
        // local sidecar.
        if base == self.match_address {
            if let Some(auth) = auth {
                request = request.header(AUTHORIZATION, auth.to_owned());
            }
        }

        let response = tokio::select! {
            result = request.send() => result?,
            _ = self.token.cancelled() => return Err(TransportError::Cancelled),
        };
        let ok = response.status() == StatusCode::OK;
        let body = tokio::select! {
            result = response.text() => result?,
            _ = self.token.cancelled() => return Err(TransportError::Cancelled),
        };

        if ok {
            debug!("request ok: {} {}", path, body);
        } else {
            debug!("request failed: {} {}", path, body);
        }
        Ok(Reply { ok, body })
    }

    /// Opens a long-lived GET whose body is read incrementally by the caller.
    pub(crate) async fn open_stream(
        &self,
        base: &str,
        path: &str,
    ) -> Result<reqwest::Response, TransportError> {
        if self.token.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let url = format!("{}{}", base, path);
        let request = self
            .stream_http
            .get(&url)
            .header(CONTENT_TYPE, "application/json");
        let response = tokio::select! {
            result = request.send() => result?,
            _ = self.token.cancelled() => return Err(TransportError::Cancelled),
        };
        Ok(response)
    }

    pub(crate) fn token(&self) -> &ShutdownToken {
        &self.token
    }
}
