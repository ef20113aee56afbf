//! Capture and reconstruction across the persistence boundary.
//!
//! Capture extracts the descriptor only, regardless of how far resolution got
//! in memory; a handle captured while resolving or even resolved yields the
//! same envelope as a pending one. Reconstruction re-binds a resolver by
//! descriptor kind and hands back a fresh pending handle, so resolution
//! restarts from scratch on the next turn.

use std::collections::HashMap;
use std::sync::Arc;

use colloquy_types::{AttachmentDescriptor, DescriptorError, ENVELOPE_SCHEMA_VERSION, ResumptionEnvelope};
use thiserror::Error;

use crate::handle::DeferredAttachment;
use crate::resolver::Resolver;

/// Errors surfaced while reconstructing a handle from a persisted envelope.
///
/// Each error is local to one envelope; a bad envelope never aborts the
/// reconstruction of its siblings.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope was written by a schema this process does not load.
    #[error("unsupported envelope schema version {0}")]
    UnsupportedSchema(u32),
    /// No resolver is registered for the envelope's descriptor kind.
    #[error("no resolver registered for descriptor kind '{0}'")]
    UnknownKind(String),
    /// The descriptor payload did not decode (persisted schema drift).
    #[error("unresolvable descriptor: {0}")]
    UnresolvableDescriptor(#[from] DescriptorError),
}

/// Capture a handle into its durable stand-in.
///
/// Reads the descriptor only; the in-flight operation and any resolved
/// payload are deliberately thrown away. Capturing the same handle at any
/// point of its lifecycle produces a byte-identical descriptor payload.
pub fn capture(handle: &DeferredAttachment) -> ResumptionEnvelope {
    ResumptionEnvelope {
        schema_version: ENVELOPE_SCHEMA_VERSION,
        descriptor_kind: handle.kind().to_string(),
        descriptor_payload: handle.descriptor().encode(),
    }
}

/// Resolver lookup used by the host to re-bind resolvers on reconstruction.
///
/// Resolvers are keyed by the descriptor kind they serve. The registry is
/// rebuilt by the host at every turn start; it is never persisted.
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: HashMap<String, Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver under its own kind, replacing any previous one.
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) {
        self.resolvers.insert(resolver.kind().to_string(), resolver);
    }

    /// Look up the resolver for a descriptor kind.
    pub fn resolver_for(&self, kind: &str) -> Option<Arc<dyn Resolver>> {
        self.resolvers.get(kind).cloned()
    }

    /// Rebuild a fresh pending handle from a persisted envelope.
    pub fn reconstruct(&self, envelope: &ResumptionEnvelope) -> Result<DeferredAttachment, EnvelopeError> {
        if envelope.schema_version != ENVELOPE_SCHEMA_VERSION {
            return Err(EnvelopeError::UnsupportedSchema(envelope.schema_version));
        }
        let resolver = self
            .resolver_for(&envelope.descriptor_kind)
            .ok_or_else(|| EnvelopeError::UnknownKind(envelope.descriptor_kind.clone()))?;
        let descriptor = AttachmentDescriptor::decode(&envelope.descriptor_payload)?;
        Ok(DeferredAttachment::new(descriptor, resolver))
    }
}

impl std::fmt::Debug for ResolverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolverRegistry")
            .field("kinds", &self.resolvers.keys().collect::<Vec<_>>())
            .finish()
    }
}
