//! Stock HTTP-backed attachment resolver.
//!
//! Fetches the descriptor's content URL with a shared `reqwest` client and
//! returns the body bytes plus the content type the server reported, falling
//! back to the descriptor's own hint. Transport and status failures map to
//! [`ResolveError::Failed`]; the resolver never retries on its own.

use async_trait::async_trait;
use colloquy_types::{ATTACHMENT_DESCRIPTOR_KIND, AttachmentDescriptor, MediaPayload};
use reqwest::header::CONTENT_TYPE;
use tracing::debug;

use crate::resolver::{ResolveError, Resolver};

/// Resolver for the `"attachment"` descriptor kind.
#[derive(Debug, Default)]
pub struct HttpAttachmentResolver {
    client: reqwest::Client,
}

impl HttpAttachmentResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, timeouts, default headers).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Resolver for HttpAttachmentResolver {
    fn kind(&self) -> &str {
        ATTACHMENT_DESCRIPTOR_KIND
    }

    async fn resolve(&self, descriptor: &AttachmentDescriptor) -> Result<MediaPayload, ResolveError> {
        let response = self
            .client
            .get(descriptor.content_url().as_str())
            .send()
            .await
            .map_err(|error| ResolveError::Failed(format!("network error: {error}")))?;

        let status = response.status();
        let observed_content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolveError::Failed(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| ResolveError::Failed(format!("body read error: {error}")))?;
        debug!(
            url = %descriptor.content_url(),
            bytes = bytes.len(),
            content_type = observed_content_type.as_deref().unwrap_or("unknown"),
            "attachment fetched"
        );

        let content_type = observed_content_type.or_else(|| descriptor.content_type().map(str::to_string));
        Ok(MediaPayload::new(bytes.to_vec(), content_type))
    }
}
