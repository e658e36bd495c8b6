//! Fetch transport for image downloads
//!
//! The batch downloader talks to the network through [`ImageFetcher`], so tests
//! can substitute instrumented stubs and callers can plug in their own transport.
//! [`HttpFetcher`] is the production implementation on top of `reqwest`.

use crate::error::{Error, ItemError};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Connect timeout for the shared HTTP client
///
/// The per-attempt timeout wraps the whole fetch; this only bounds the TCP/TLS handshake.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Bytes and metadata returned by one successful fetch
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// Response body
    pub bytes: Vec<u8>,
    /// Declared Content-Type header, if any
    pub content_type: Option<String>,
}

/// Abstraction over fetching a single URL, enabling testability
///
/// Implementations report failures as [`ItemError`] so the retry state machine
/// can tell transient conditions from permanent ones. The caller applies the
/// per-attempt timeout around `fetch`.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch the body at `url`
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, ItemError>;
}

/// Production [`ImageFetcher`] backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Build a fetcher that identifies itself with `user_agent`
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(user_agent: &str) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client })
    }

    /// Wrap an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ImageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedImage, ItemError> {
        let parsed = parse_image_url(url)?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        tracing::debug!(
            url = %url,
            size = bytes.len(),
            content_type = content_type.as_deref().unwrap_or("unknown"),
            "Fetched response body"
        );

        Ok(FetchedImage {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Parse a source URL, accepting only `http` and `https`
pub fn parse_image_url(url: &str) -> std::result::Result<Url, ItemError> {
    let parsed = Url::parse(url).map_err(|e| ItemError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ItemError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Map a non-success HTTP status onto the item error taxonomy
pub fn classify_status(status: u16) -> ItemError {
    match status {
        500..=599 => ItemError::ServerStatus { status },
        400..=499 => ItemError::ClientStatus { status },
        _ => ItemError::UnexpectedStatus { status },
    }
}

fn classify_reqwest_error(url: &str, e: reqwest::Error) -> ItemError {
    if e.is_builder() {
        ItemError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        }
    } else if e.is_connect() {
        if e.is_timeout() {
            ItemError::Connect(format!(
                "connect timed out after {CONNECT_TIMEOUT_SECS}s: {e}"
            ))
        } else {
            ItemError::Connect(e.to_string())
        }
    } else if e.is_timeout() {
        // A client-level timeout of unknown length, not the per-attempt one
        ItemError::Transport(format!("request timed out: {e}"))
    } else {
        ItemError::Transport(e.to_string())
    }
}
