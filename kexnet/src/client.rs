//! Blocking [`Exchange`] over HTTP.
//!
//! The engine is synchronous, so each exchange drives one reqwest request to
//! completion on the runtime handle. Callers must be on a blocking thread
//! (`spawn_blocking` or a plain OS thread), never on a runtime worker.

use std::collections::HashMap;
use std::time::Duration;

use kextrust::{Endpoint, Exchange, KexError, Party};
use reqwest::header::CONTENT_TYPE;
use tokio::runtime::Handle;
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_AUTHORITY_TIMEOUT: Duration = Duration::from_secs(5);
/// Peer calls include the acceptor's own call to the authority.
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(15);

/// Where the authority and each known peer listen.
#[derive(Debug, Clone)]
pub struct Directory {
    authority: String,
    peers: HashMap<String, String>,
}

impl Directory {
    pub fn new(authority_url: impl Into<String>) -> Self {
        Self {
            authority: trim(authority_url.into()),
            peers: HashMap::new(),
        }
    }

    pub fn with_peer(mut self, id: impl Into<String>, url: impl Into<String>) -> Self {
        self.peers.insert(id.into(), trim(url.into()));
        self
    }

    /// Full URL of `endpoint` on `party`.
    pub fn url(&self, party: Party<'_>, endpoint: Endpoint) -> kextrust::Result<String> {
        let base = match party {
            Party::Authority => &self.authority,
            Party::Peer(id) => self
                .peers
                .get(id)
                .ok_or_else(|| KexError::TransportError(format!("no address for peer {id}")))?,
        };
        Ok(format!("{base}{}", endpoint.path()))
    }

    /// Known peer IDs, sorted.
    pub fn peers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.peers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

fn trim(url: String) -> String {
    url.trim_end_matches('/').to_owned()
}

/// HTTP client side of the transport.
pub struct HttpExchange {
    client: reqwest::Client,
    handle: Handle,
    directory: Directory,
    authority_timeout: Duration,
    peer_timeout: Duration,
}

impl HttpExchange {
    pub fn new(handle: Handle, directory: Directory) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            handle,
            directory,
            authority_timeout: DEFAULT_AUTHORITY_TIMEOUT,
            peer_timeout: DEFAULT_PEER_TIMEOUT,
        })
    }

    pub fn with_timeouts(mut self, authority: Duration, peer: Duration) -> Self {
        self.authority_timeout = authority;
        self.peer_timeout = peer;
        self
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    fn timeout_for(&self, party: Party<'_>) -> Duration {
        match party {
            Party::Authority => self.authority_timeout,
            Party::Peer(_) => self.peer_timeout,
        }
    }

    async fn post(&self, to: Party<'_>, url: &str, payload: Vec<u8>) -> kextrust::Result<Vec<u8>> {
        let transport = |e: reqwest::Error| {
            if e.is_timeout() {
                KexError::TransportError(format!("{to} timed out"))
            } else {
                KexError::TransportError(format!("{to}: {e}"))
            }
        };

        let response = self
            .client
            .post(url)
            .timeout(self.timeout_for(to))
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport)?;
        if !status.is_success() {
            return Err(KexError::TransportError(format!(
                "{to} answered {status}: {}",
                String::from_utf8_lossy(&body)
            )));
        }
        Ok(body.to_vec())
    }
}

impl Exchange for HttpExchange {
    fn exchange(&self, to: Party<'_>, endpoint: Endpoint, payload: Vec<u8>) -> kextrust::Result<Vec<u8>> {
        let url = self.directory.url(to, endpoint)?;
        debug!(%url, len = payload.len(), "posting");
        self.handle.block_on(self.post(to, &url, payload))
    }
}
