//! Declares the boundary towards remote cache peers.
//!
//! Two contracts live here: a [PeerPicker] decides *which* node owns a given key (or that the
//! key should be served locally) and a [PeerClient] knows *how* to ask a specific node for a
//! value. The selection algorithm itself (most commonly consistent hashing over the set of
//! known nodes) is deliberately left to the embedding application - the orchestration in
//! [group](crate::group) only relies on the picker being deterministic for a fixed topology.
//!
//! [HttpPeerClient] provides the default transport: an HTTP GET against the peer's base URL
//! with the group and key embedded as escaped path segments (see [crate::protocol]), answered
//! by a binary encoded [FetchResponse] body. Connection failures, non-success status codes and
//! malformed response bodies are all surfaced uniformly as errors - the caller never needs to
//! distinguish them, as any peer failure simply triggers a fallback to the local source.
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use hyper::{Body, Client, Uri};
use hyper_tls::HttpsConnector;

use crate::protocol::{FetchRequest, FetchResponse};

/// Resolves a key to the peer owning it.
pub trait PeerPicker: Send + Sync {
    /// Picks the peer which owns the given key.
    ///
    /// Returning **None** signals that no remote node should be consulted and the key has to
    /// be resolved locally. The selection must be pure: repeated picks for an unchanged peer
    /// set have to route a given key to the same peer.
    fn pick(&self, key: &str) -> Option<Arc<dyn PeerClient>>;
}

/// Fetches values from one specific remote peer.
#[async_trait::async_trait]
pub trait PeerClient: Send + Sync {
    /// Asks the peer to resolve the given request.
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse>;
}

/// Talks to a peer via HTTP.
///
/// # Examples
/// ```
/// # use peercache::peers::HttpPeerClient;
/// let peer = HttpPeerClient::new("http://cache-node-7:2410/");
/// assert_eq!(peer.base_url(), "http://cache-node-7:2410");
/// ```
pub struct HttpPeerClient {
    base_url: String,
}

impl HttpPeerClient {
    /// Creates a client for the peer reachable under the given base URL.
    ///
    /// Trailing slashes are stripped, as the request path (which starts with a slash) is
    /// appended for each fetch.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            let _ = base_url.pop();
        }

        HttpPeerClient { base_url }
    }

    /// Returns the base URL of the peer this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch(&self, request: &FetchRequest) -> anyhow::Result<FetchResponse> {
        let url = format!("{}{}", self.base_url, request.uri_path());
        let uri = Uri::from_str(&url).with_context(|| format!("Invalid peer URL: {}", url))?;

        let response = if url.starts_with("https") {
            let https = HttpsConnector::new();
            let client = Client::builder().build::<_, Body>(https);
            client.get(uri).await
        } else {
            let client = Client::new();
            client.get(uri).await
        }
        .with_context(|| format!("Failed to reach peer {}", self.base_url))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Peer {} answered '{}' for key '{}' of group '{}'.",
                self.base_url,
                response.status(),
                request.key,
                request.group
            ));
        }

        let body = hyper::body::to_bytes(response.into_body())
            .await
            .with_context(|| format!("Failed to read the response of peer {}", self.base_url))?;

        FetchResponse::decode(&body)
            .with_context(|| format!("Failed to decode the response of peer {}", self.base_url))
    }
}
