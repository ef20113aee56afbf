//! Turn driving: reconstruction at turn start, capture at turn end.
//!
//! One [`TurnSession`] covers one invocation cycle of a conversation. It is
//! the only component allowed to capture handles mid-resolution: whatever a
//! handle was doing when the turn ends, the session persists its descriptor
//! and lets the next turn retry from scratch. Wait deadlines and retry
//! counts are policy decisions made here, never inside the handle.

use std::sync::Arc;
use std::time::Duration;

use colloquy_engine::{DeferredAttachment, EnvelopeError, HandleError, ResolveError, Resolver, ResolverRegistry, capture};
use colloquy_types::{AttachmentDescriptor, MediaPayload};
use tracing::{debug, warn};

use crate::store::{CheckpointStore, CheckpointStoreError, TurnCheckpoint};

/// A persisted envelope that could not be turned back into a handle.
///
/// Surfaced to the workflow author instead of being silently dropped; the
/// index refers to the envelope's position in the loaded checkpoint.
#[derive(Debug)]
pub struct ReconstructionFailure {
    pub index: usize,
    pub error: EnvelopeError,
}

/// Runtime state of one conversational turn.
pub struct TurnSession {
    conversation_id: String,
    handles: Vec<Arc<DeferredAttachment>>,
    reconstruction_failures: Vec<ReconstructionFailure>,
}

impl TurnSession {
    /// Start a turn: load the conversation's checkpoint and reconstruct a
    /// fresh pending handle for every persisted envelope.
    ///
    /// A bad envelope is skipped with a warning and recorded in
    /// [`reconstruction_failures`](Self::reconstruction_failures); it never
    /// aborts reconstruction of its siblings.
    pub fn begin(
        conversation_id: impl Into<String>,
        store: &dyn CheckpointStore,
        registry: &ResolverRegistry,
    ) -> Result<Self, CheckpointStoreError> {
        let conversation_id = conversation_id.into();
        let mut session = Self {
            handles: Vec::new(),
            reconstruction_failures: Vec::new(),
            conversation_id,
        };

        let Some(checkpoint) = store.load(&session.conversation_id)? else {
            return Ok(session);
        };

        for (index, envelope) in checkpoint.envelopes.iter().enumerate() {
            match registry.reconstruct(envelope) {
                Ok(handle) => session.handles.push(Arc::new(handle)),
                Err(error) => {
                    warn!(
                        conversation_id = %session.conversation_id,
                        index,
                        %error,
                        "skipping undecodable resumption envelope"
                    );
                    session.reconstruction_failures.push(ReconstructionFailure { index, error });
                }
            }
        }
        debug!(
            conversation_id = %session.conversation_id,
            reconstructed = session.handles.len(),
            skipped = session.reconstruction_failures.len(),
            "turn started"
        );
        Ok(session)
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    /// Create and track a new deferred resolution for this turn.
    pub fn begin_resolution(&mut self, descriptor: AttachmentDescriptor, resolver: Arc<dyn Resolver>) -> Arc<DeferredAttachment> {
        let handle = Arc::new(DeferredAttachment::new(descriptor, resolver));
        self.handles.push(Arc::clone(&handle));
        handle
    }

    /// Handles live in this turn, reconstructed ones first.
    pub fn handles(&self) -> &[Arc<DeferredAttachment>] {
        &self.handles
    }

    /// Envelopes that failed reconstruction at turn start.
    pub fn reconstruction_failures(&self) -> &[ReconstructionFailure] {
        &self.reconstruction_failures
    }

    /// Wait for a handle up to a deadline.
    ///
    /// `None` means the deadline elapsed and the wait future was dropped. If
    /// this wait was driving the resolving episode the handle reverts to
    /// pending; if another task holds the episode it stays resolving. Either
    /// way a subsequent [`checkpoint`](Self::checkpoint) persists the
    /// descriptor for the next turn instead of blocking this one.
    pub async fn resolve_within(
        &self,
        handle: &DeferredAttachment,
        deadline: Duration,
    ) -> Option<Result<MediaPayload, HandleError>> {
        tokio::time::timeout(deadline, handle.value()).await.ok()
    }

    /// Turn-level retry policy: run up to `max_attempts` resolution attempts,
    /// creating a fresh handle per attempt since a failed handle is terminal.
    ///
    /// Retries only transport failures; cancellation stops the loop. The
    /// final attempt's handle is tracked for checkpointing and returned with
    /// its outcome.
    pub async fn resolve_with_retry(
        &mut self,
        descriptor: AttachmentDescriptor,
        resolver: Arc<dyn Resolver>,
        max_attempts: u32,
    ) -> (Arc<DeferredAttachment>, Result<MediaPayload, HandleError>) {
        debug_assert!(max_attempts > 0);
        let mut attempt = 1;
        loop {
            let handle = Arc::new(DeferredAttachment::new(descriptor.clone(), Arc::clone(&resolver)));
            let outcome = handle.value().await;
            let retryable = matches!(outcome, Err(HandleError::Resolution(ResolveError::Failed(_))));
            if !retryable || attempt >= max_attempts {
                self.handles.push(Arc::clone(&handle));
                return (handle, outcome);
            }
            debug!(
                conversation_id = %self.conversation_id,
                attempt,
                max_attempts,
                "resolution attempt failed; retrying with a fresh handle"
            );
            attempt += 1;
        }
    }

    /// Abandon the turn: cancel every non-terminal handle.
    pub fn abandon(&self) {
        for handle in &self.handles {
            handle.cancel();
        }
    }

    /// End the turn: capture every tracked handle (whatever its status) into
    /// an envelope and persist the resulting checkpoint.
    pub fn checkpoint(&self, store: &dyn CheckpointStore) -> Result<TurnCheckpoint, CheckpointStoreError> {
        let envelopes = self.handles.iter().map(|handle| capture(handle)).collect();
        let checkpoint = TurnCheckpoint::new(envelopes);
        store.save(&self.conversation_id, checkpoint.clone())?;
        debug!(
            conversation_id = %self.conversation_id,
            envelopes = checkpoint.envelopes.len(),
            "turn checkpointed"
        );
        Ok(checkpoint)
    }
}
