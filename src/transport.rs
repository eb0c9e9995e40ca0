//! HTTP Peer Transport
//!
//! Every cross-process call in the cluster (client -> coordinator, client -> node,
//! node -> node forwarding, node -> coordinator heartbeats, checker -> node repair
//! instructions) goes through [`PeerClient`].
//!
//! ## Failure mapping
//! - A request that never gets an answer (refused connection, timeout) becomes
//!   [`DfsError::NodeUnreachable`]: the peer is treated as offline.
//! - A non-success status carries `{"error": "..."}`; the text is relayed as
//!   [`DfsError::Rejected`].
//!
//! Calls are made once. Retrying is left to the caller's next periodic cycle or to
//! the operator.

use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{DfsError, DfsResult, ErrorResponse};

/// Generic acknowledgment body: `{"message": ...}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            timeout,
        }
    }

    /// Same connection pool, different per-request timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            http: self.http.clone(),
            timeout,
        }
    }

    /// Joins `segments` onto `base`, percent-encoding each one.
    ///
    /// Directory paths contain `\`, which must not reach the server raw. Pass a
    /// trailing `""` segment to produce a trailing slash.
    pub fn endpoint(base: &str, segments: &[&str]) -> DfsResult<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| DfsError::Malformed(format!("invalid peer url {:?}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| DfsError::Malformed(format!("peer url {:?} cannot carry a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    pub async fn get_json<R: DeserializeOwned>(&self, url: Url) -> DfsResult<R> {
        self.send::<(), R>(Method::GET, url, None).await
    }

    pub async fn post_json<B: Serialize, R: DeserializeOwned>(&self, url: Url, body: &B) -> DfsResult<R> {
        self.send(Method::POST, url, Some(body)).await
    }

    pub async fn put_json<B: Serialize, R: DeserializeOwned>(&self, url: Url, body: &B) -> DfsResult<R> {
        self.send(Method::PUT, url, Some(body)).await
    }

    pub async fn delete_json<R: DeserializeOwned>(&self, url: Url) -> DfsResult<R> {
        self.send::<(), R>(Method::DELETE, url, None).await
    }

    pub async fn delete_with_body<B: Serialize, R: DeserializeOwned>(
        &self,
        url: Url,
        body: &B,
    ) -> DfsResult<R> {
        self.send(Method::DELETE, url, Some(body)).await
    }

    async fn send<B: Serialize, R: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<&B>,
    ) -> DfsResult<R> {
        let peer = url
            .host_str()
            .map(|host| match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
            .unwrap_or_else(|| url.to_string());

        tracing::debug!("{} {}", method, url);

        let mut request = self.http.request(method, url).timeout(self.timeout);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Peer {} is offline: {}", peer, e);
            DfsError::NodeUnreachable(peer.clone())
        })?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|_| DfsError::NodeUnreachable(peer.clone()))?;

        if !status.is_success() {
            let reason = match serde_json::from_slice::<ErrorResponse>(&bytes) {
                Ok(body) => body.error,
                Err(_) => format!("{} answered {}", peer, status),
            };
            return Err(DfsError::Rejected(reason));
        }

        serde_json::from_slice(&bytes)
            .map_err(|e| DfsError::Malformed(format!("unexpected reply from {}: {}", peer, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_encodes_directory_separator() {
        let url = PeerClient::endpoint("http://127.0.0.1:4000", &["file", "data\\logs", "a.txt"])
            .unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4000/file/data%5Clogs/a.txt");
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let url = PeerClient::endpoint("http://127.0.0.1:4000/", &["heartbeat", ""]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4000/heartbeat/");
    }

    #[test]
    fn test_endpoint_rejects_garbage() {
        assert!(matches!(
            PeerClient::endpoint("not a url", &["x"]),
            Err(DfsError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_peer_is_reported_offline() {
        // Port 9 (discard) on loopback is expected to refuse connections.
        let client = PeerClient::new(Duration::from_millis(500));
        let url = PeerClient::endpoint("http://127.0.0.1:9", &[""]).unwrap();

        let result: DfsResult<MessageResponse> = client.get_json(url).await;
        assert!(matches!(result, Err(DfsError::NodeUnreachable(_))));
    }
}
