//! HTTP transport for the agent backend.
//!
//! One `POST` per user message; the response body is a newline-delimited
//! JSON stream handed back as raw chunks for the decoder.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};
use serde::Serialize;

use crate::config::ClientConfig;

/// Longest response body kept in a [`ClientError::Status`].
const MAX_ERROR_BODY: usize = 512;

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Raw response body chunks.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, ClientError>>;

/// Request body for the chat endpoint.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    /// The user's message.
    pub message: &'a str,
}

/// Trait for backend communication.
///
/// Abstracts the HTTP client so the stream task and the status monitor can
/// be driven by scripted transports in tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send one chat message and return the response body stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the backend rejects it.
    async fn send(&self, message: &str) -> Result<ChunkStream, ClientError>;

    /// Check whether the backend is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if no HTTP response could be obtained.
    async fn probe(&self) -> Result<(), ClientError>;
}

/// Transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    chat_url: String,
    health_url: String,
    probe_timeout: Duration,
}

impl HttpTransport {
    /// Create a transport from the client configuration.
    ///
    /// Only a connect timeout is set on the client: reply bodies may stay
    /// open for as long as the agent keeps working. Status probes carry their
    /// own whole-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self::with_client(client, config))
    }

    /// Create a transport with a custom reqwest client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            client,
            chat_url: config.chat_url(),
            health_url: config.health_url(),
            probe_timeout: config.probe_timeout(),
        }
    }

    /// Get the chat endpoint URL.
    #[must_use]
    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(&self, message: &str) -> Result<ChunkStream, ClientError> {
        let response = self
            .client
            .post(&self.chat_url)
            .json(&ChatRequest { message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);

            tracing::error!(status = %status, body = %body, "Chat request rejected");

            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(status = %status, url = %self.chat_url, "Chat response streaming");

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from))
            .boxed())
    }

    async fn probe(&self) -> Result<(), ClientError> {
        // Any HTTP answer means the backend is up, whatever the status.
        let response = self
            .client
            .get(&self.health_url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        tracing::trace!(status = %response.status(), "Backend probe answered");
        Ok(())
    }
}

fn truncate_at_char_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}
