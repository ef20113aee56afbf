//! Resolver contract shared across the engine and host.
//!
//! A resolver knows how to turn one kind of descriptor into bytes right now.
//! It is re-supplied by the reconstructing context on every turn and is never
//! part of persisted state, which keeps "what to fetch" durable and "how to
//! fetch it" host-bound.

use async_trait::async_trait;
use colloquy_types::{AttachmentDescriptor, MediaPayload};
use thiserror::Error;

/// Errors produced while resolving a descriptor.
///
/// Cloneable so a terminal handle can hand the same outcome to every
/// requester without re-running the fetch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The external fetch failed (transport or validation). Retried only if
    /// the host's turn-level policy says so, never silently by the handle.
    #[error("resolution failed: {0}")]
    Failed(String),
    /// The owning turn was abandoned mid-resolution. Terminal for the handle
    /// instance; a fresh handle must be created to try again.
    #[error("resolution cancelled")]
    Cancelled,
}

/// Asynchronous mapping from a descriptor to its resolved payload.
///
/// Implementations must be side-effect-free on the descriptor and idempotent
/// from the caller's perspective: resolving the same descriptor twice is
/// always safe. Retry policy belongs to the host, not the resolver.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Descriptor kind this resolver serves; recorded in captured envelopes
    /// so the host can re-bind the right resolver on reconstruction.
    fn kind(&self) -> &str;

    /// Perform the fetch.
    async fn resolve(&self, descriptor: &AttachmentDescriptor) -> Result<MediaPayload, ResolveError>;

    /// Inspect a fetched payload before it is handed to the requester.
    ///
    /// The default accepts everything; no size or content-type guarantee is
    /// load-bearing in the core contract.
    fn validate(&self, _payload: &MediaPayload) -> Result<(), ResolveError> {
        Ok(())
    }
}
