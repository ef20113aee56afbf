//! Durable description of an external value to be fetched.
//!
//! An [`AttachmentDescriptor`] identifies an attachment deterministically: the
//! retrieval URL plus optional hints. It is the only part of a deferred
//! attachment that survives serialization, so its durable encoding must
//! round-trip without loss (`decode(encode(d)) == d`).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Descriptor kind tag used to re-bind a resolver on reconstruction.
pub const ATTACHMENT_DESCRIPTOR_KIND: &str = "attachment";

/// Errors surfaced while constructing or decoding a descriptor.
///
/// Construction failures are programming errors in the calling workflow and
/// are never retried.
#[derive(Debug, Error)]
pub enum DescriptorError {
    /// The descriptor was built without a content URL.
    #[error("descriptor has no content URL")]
    MissingUrl,
    /// The content URL could not be parsed.
    #[error("invalid content URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    /// The content URL uses a scheme the runtime cannot fetch.
    #[error("unsupported URL scheme '{0}'")]
    UnsupportedScheme(String),
    /// A persisted payload did not decode into a descriptor (schema drift).
    #[error("descriptor payload did not decode: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Immutable, structurally comparable description of an attachment.
///
/// Two descriptors that compare equal must resolve to equivalent payloads (or
/// fail with the same error kind); resolution is keyed on nothing else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    content_url: Url,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl AttachmentDescriptor {
    /// Build a descriptor from a retrieval URL, validating it up front.
    pub fn new(content_url: &str) -> Result<Self, DescriptorError> {
        if content_url.trim().is_empty() {
            return Err(DescriptorError::MissingUrl);
        }
        let parsed = Url::parse(content_url).map_err(|source| DescriptorError::InvalidUrl {
            url: content_url.to_string(),
            source,
        })?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(DescriptorError::UnsupportedScheme(other.to_string())),
        }
        Ok(Self {
            content_url: parsed,
            content_type: None,
            name: None,
        })
    }

    /// Attach an expected content type hint.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Attach the original attachment name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn content_url(&self) -> &Url {
        &self.content_url
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Durable canonical encoding used as the envelope payload.
    ///
    /// Field order is fixed by the struct declaration, so structurally equal
    /// descriptors encode to byte-identical strings.
    pub fn encode(&self) -> String {
        serde_json::to_string(self).expect("descriptor encoding is infallible")
    }

    /// Decode a durable payload back into a descriptor.
    ///
    /// Re-validates the URL scheme so that a payload written by a drifted
    /// schema cannot smuggle an unfetchable descriptor back in.
    pub fn decode(payload: &str) -> Result<Self, DescriptorError> {
        let descriptor: Self = serde_json::from_str(payload)?;
        match descriptor.content_url.scheme() {
            "http" | "https" => Ok(descriptor),
            other => Err(DescriptorError::UnsupportedScheme(other.to_string())),
        }
    }
}
