//! The deferred attachment handle and its resolution state machine.
//!
//! A [`DeferredAttachment`] owns a descriptor and a resolver reference and
//! tracks one resolution attempt at a time. Status moves monotonically from
//! `Pending` through `Resolving` to a terminal `Resolved` or `Failed`; once
//! terminal, the cached outcome is returned to every requester without
//! touching the resolver again.
//!
//! Concurrency discipline: the status field is guarded by a single mutex
//! (single writer, many readers), and a [`Notify`] hands the resolving
//! episode's completion to concurrent waiters. If the task driving an episode
//! is dropped mid-await, the episode guard reverts the handle to `Pending`
//! and wakes a waiter to take over, so a dropped turn never wedges the
//! handle.

use std::sync::{Arc, Mutex};

use colloquy_types::{AttachmentDescriptor, MediaPayload};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

use crate::resolver::{ResolveError, Resolver};

/// Observable resolution status of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionStatus {
    /// No resolution attempted yet.
    Pending,
    /// A resolver invocation is in flight.
    Resolving,
    /// Terminal: the payload is cached on the handle.
    Resolved,
    /// Terminal: the error is cached on the handle.
    Failed,
}

/// Errors surfaced to the holder of a handle.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HandleError {
    /// The value was requested without waiting and no terminal outcome
    /// exists yet. A programming-contract violation, surfaced immediately.
    #[error("attachment is not resolved yet")]
    NotReady,
    /// The resolution attempt itself failed.
    #[error(transparent)]
    Resolution(#[from] ResolveError),
}

enum Inner {
    Pending,
    Resolving,
    Done(Result<MediaPayload, ResolveError>),
}

/// Resumable deferred-resolution primitive.
///
/// Created per request via [`DeferredAttachment::new`] and destroyed with the
/// owning workflow frame, or superseded by a freshly reconstructed handle
/// after resumption. Capture into an envelope is legal from any status and
/// reads the descriptor only; see [`crate::envelope::capture`].
pub struct DeferredAttachment {
    descriptor: AttachmentDescriptor,
    resolver: Arc<dyn Resolver>,
    inner: Mutex<Inner>,
    episode_done: Notify,
    cancel_signal: Notify,
}

impl DeferredAttachment {
    /// Bind a descriptor to the resolver that will fetch it.
    pub fn new(descriptor: AttachmentDescriptor, resolver: Arc<dyn Resolver>) -> Self {
        Self {
            descriptor,
            resolver,
            inner: Mutex::new(Inner::Pending),
            episode_done: Notify::new(),
            cancel_signal: Notify::new(),
        }
    }

    pub fn descriptor(&self) -> &AttachmentDescriptor {
        &self.descriptor
    }

    /// Descriptor kind of the bound resolver, recorded on capture.
    pub fn kind(&self) -> &str {
        self.resolver.kind()
    }

    pub fn status(&self) -> ResolutionStatus {
        match &*self.inner.lock().expect("handle state lock poisoned") {
            Inner::Pending => ResolutionStatus::Pending,
            Inner::Resolving => ResolutionStatus::Resolving,
            Inner::Done(Ok(_)) => ResolutionStatus::Resolved,
            Inner::Done(Err(_)) => ResolutionStatus::Failed,
        }
    }

    /// Return the cached outcome without waiting.
    ///
    /// Fails with [`HandleError::NotReady`] while no terminal outcome exists.
    pub fn try_value(&self) -> Result<MediaPayload, HandleError> {
        match &*self.inner.lock().expect("handle state lock poisoned") {
            Inner::Done(Ok(payload)) => Ok(payload.clone()),
            Inner::Done(Err(error)) => Err(error.clone().into()),
            Inner::Pending | Inner::Resolving => Err(HandleError::NotReady),
        }
    }

    /// Request the value, suspending until resolution completes.
    ///
    /// The first requester on a pending handle drives the resolver; any
    /// concurrent requester observes the same in-flight episode instead of
    /// starting a duplicate one. Terminal handles return their cached outcome
    /// without re-invoking the resolver.
    pub async fn value(&self) -> Result<MediaPayload, HandleError> {
        loop {
            // Register for episode completion before inspecting the status so
            // a finish between the two cannot be missed.
            let episode_done = self.episode_done.notified();
            let drives_episode = {
                let mut inner = self.inner.lock().expect("handle state lock poisoned");
                match &*inner {
                    Inner::Done(Ok(payload)) => return Ok(payload.clone()),
                    Inner::Done(Err(error)) => return Err(error.clone().into()),
                    Inner::Resolving => false,
                    Inner::Pending => {
                        *inner = Inner::Resolving;
                        true
                    }
                }
            };

            if drives_episode {
                return self.drive_episode().await;
            }
            episode_done.await;
        }
    }

    /// Abandon the handle: non-terminal states become `Failed(Cancelled)`.
    ///
    /// The in-flight resolver operation is cancelled on a best-effort basis;
    /// correctness never depends on that happening promptly, because a
    /// cancelled handle is either discarded or re-derived from its descriptor
    /// on the next turn.
    pub fn cancel(&self) {
        {
            let mut inner = self.inner.lock().expect("handle state lock poisoned");
            if matches!(&*inner, Inner::Done(_)) {
                return;
            }
            *inner = Inner::Done(Err(ResolveError::Cancelled));
        }
        debug!(url = %self.descriptor.content_url(), "attachment resolution cancelled");
        self.cancel_signal.notify_waiters();
        self.episode_done.notify_waiters();
    }

    /// Run one resolving episode: invoke the resolver exactly once, record
    /// the terminal outcome, and wake every waiter.
    async fn drive_episode(&self) -> Result<MediaPayload, HandleError> {
        let mut guard = EpisodeGuard {
            handle: self,
            armed: true,
        };
        debug!(url = %self.descriptor.content_url(), "attachment resolution started");

        let resolve = self.resolver.resolve(&self.descriptor);
        tokio::pin!(resolve);
        let outcome = tokio::select! {
            outcome = &mut resolve => match outcome {
                Ok(payload) => self.resolver.validate(&payload).map(|()| payload),
                Err(error) => Err(error),
            },
            () = self.cancel_signal.notified() => Err(ResolveError::Cancelled),
        };
        guard.armed = false;

        let result = {
            let mut inner = self.inner.lock().expect("handle state lock poisoned");
            if let Inner::Done(existing) = &*inner {
                // cancel() won the race while the fetch was outstanding; the
                // terminal outcome it recorded stays.
                existing.clone()
            } else {
                *inner = Inner::Done(outcome.clone());
                outcome
            }
        };
        match &result {
            Ok(payload) => {
                debug!(url = %self.descriptor.content_url(), bytes = payload.len(), "attachment resolved");
            }
            Err(error) => {
                debug!(url = %self.descriptor.content_url(), %error, "attachment resolution failed");
            }
        }
        self.episode_done.notify_waiters();
        result.map_err(HandleError::Resolution)
    }
}

impl std::fmt::Debug for DeferredAttachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredAttachment")
            .field("descriptor", &self.descriptor)
            .field("kind", &self.kind())
            .field("status", &self.status())
            .finish()
    }
}

/// Reverts an interrupted resolving episode so a waiter can take over.
struct EpisodeGuard<'a> {
    handle: &'a DeferredAttachment,
    armed: bool,
}

impl Drop for EpisodeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut inner = self.handle.inner.lock().expect("handle state lock poisoned");
            if matches!(&*inner, Inner::Resolving) {
                *inner = Inner::Pending;
            }
        }
        self.handle.episode_done.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    fn png_descriptor() -> AttachmentDescriptor {
        AttachmentDescriptor::new("http://x/a.png").expect("valid URL")
    }

    /// Counts invocations; optionally delays or fails every call.
    struct CountingResolver {
        calls: AtomicUsize,
        delay: Option<Duration>,
        error: Option<String>,
    }

    impl CountingResolver {
        fn succeeding() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: None,
                error: None,
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::succeeding()
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                error: Some(message.to_string()),
                ..Self::succeeding()
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Resolver for CountingResolver {
        fn kind(&self) -> &str {
            "attachment"
        }

        async fn resolve(&self, _descriptor: &AttachmentDescriptor) -> Result<MediaPayload, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.error {
                Some(message) => Err(ResolveError::Failed(message.clone())),
                None => Ok(MediaPayload::new(vec![1, 2, 3], Some("image/png".into()))),
            }
        }
    }

    /// Hangs forever on the first call, succeeds on later calls.
    struct StallOnceResolver {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Resolver for StallOnceResolver {
        fn kind(&self) -> &str {
            "attachment"
        }

        async fn resolve(&self, _descriptor: &AttachmentDescriptor) -> Result<MediaPayload, ResolveError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                std::future::pending::<()>().await;
            }
            Ok(MediaPayload::new(vec![9], None))
        }
    }

    #[tokio::test]
    async fn resolves_through_state_machine() {
        let resolver = Arc::new(CountingResolver::succeeding());
        let handle = DeferredAttachment::new(png_descriptor(), resolver.clone());

        assert_eq!(handle.status(), ResolutionStatus::Pending);
        let payload = handle.value().await.expect("resolved");
        assert_eq!(payload.bytes(), &[1, 2, 3]);
        assert_eq!(handle.status(), ResolutionStatus::Resolved);
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn terminal_success_is_cached() {
        let resolver = Arc::new(CountingResolver::succeeding());
        let handle = DeferredAttachment::new(png_descriptor(), resolver.clone());

        let first = handle.value().await.expect("resolved");
        let second = handle.value().await.expect("cached");
        assert_eq!(first, second);
        assert_eq!(resolver.call_count(), 1);
    }

    #[tokio::test]
    async fn terminal_failure_is_cached() {
        let resolver = Arc::new(CountingResolver::failing("connection refused"));
        let handle = DeferredAttachment::new(png_descriptor(), resolver.clone());

        let first = handle.value().await.expect_err("failed");
        assert_eq!(
            first,
            HandleError::Resolution(ResolveError::Failed("connection refused".into()))
        );
        assert_eq!(handle.status(), ResolutionStatus::Failed);

        let second = handle.value().await.expect_err("cached failure");
        assert_eq!(first, second);
        assert_eq!(resolver.call_count(), 1, "failed handle must not retry the network call");
    }

    #[tokio::test]
    async fn try_value_reports_not_ready_then_outcome() {
        let handle = DeferredAttachment::new(png_descriptor(), Arc::new(CountingResolver::succeeding()));

        assert_eq!(handle.try_value().expect_err("pending"), HandleError::NotReady);
        handle.value().await.expect("resolved");
        assert_eq!(handle.try_value().expect("cached").bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_episode() {
        let resolver = Arc::new(CountingResolver::slow(Duration::from_millis(25)));
        let handle = Arc::new(DeferredAttachment::new(png_descriptor(), resolver.clone()));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let handle = Arc::clone(&handle);
            tasks.push(tokio::spawn(async move { handle.value().await }));
        }

        for task in tasks {
            let payload = task.await.expect("join").expect("resolved");
            assert_eq!(payload.bytes(), &[1, 2, 3]);
        }
        assert_eq!(resolver.call_count(), 1, "exactly one resolver invocation for N requesters");
    }

    #[tokio::test]
    async fn cancel_is_terminal_and_wakes_waiters() {
        let resolver = Arc::new(StallOnceResolver {
            calls: AtomicUsize::new(0),
        });
        let handle = Arc::new(DeferredAttachment::new(png_descriptor(), resolver));

        let driver = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.value().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.status(), ResolutionStatus::Resolving);

        handle.cancel();
        let outcome = driver.await.expect("join");
        assert_eq!(outcome, Err(HandleError::Resolution(ResolveError::Cancelled)));
        assert_eq!(handle.status(), ResolutionStatus::Failed);

        // Cancelled is terminal for this handle instance.
        assert_eq!(
            handle.value().await,
            Err(HandleError::Resolution(ResolveError::Cancelled))
        );
    }

    #[tokio::test]
    async fn cancel_after_resolution_keeps_outcome() {
        let handle = DeferredAttachment::new(png_descriptor(), Arc::new(CountingResolver::succeeding()));
        handle.value().await.expect("resolved");

        handle.cancel();
        assert_eq!(handle.status(), ResolutionStatus::Resolved);
        assert_eq!(handle.try_value().expect("still resolved").bytes(), &[1, 2, 3]);
    }

    #[tokio::test]
    async fn dropped_episode_reverts_to_pending_for_the_next_requester() {
        let resolver = Arc::new(StallOnceResolver {
            calls: AtomicUsize::new(0),
        });
        let handle = Arc::new(DeferredAttachment::new(png_descriptor(), resolver.clone()));

        let stalled = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.value().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.status(), ResolutionStatus::Resolving);

        stalled.abort();
        let _ = stalled.await;
        assert_eq!(handle.status(), ResolutionStatus::Pending);

        let payload = handle.value().await.expect("second episode succeeds");
        assert_eq!(payload.bytes(), &[9]);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }
}
