//! End-to-end turn cycle: suspend, serialize, resume on a "new host".
//!
//! Drives the whole contract through public APIs only: a turn starts a
//! resolution, runs out of time mid-flight, checkpoints the descriptor, and
//! a later turn (fresh registry and resolver, as after a process restart)
//! re-derives the same payload from the persisted envelope.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use colloquy_engine::{HandleError, ResolutionStatus, ResolveError, Resolver, ResolverRegistry};
use colloquy_host::{InMemoryCheckpointStore, JsonCheckpointStore, TurnSession};
use colloquy_types::{AttachmentDescriptor, MediaPayload};

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("debug").try_init();
}

/// Stalls for `delay` then returns fixed bytes; counts invocations.
struct SlowBytesResolver {
    calls: AtomicUsize,
    delay: Duration,
    bytes: Vec<u8>,
}

impl SlowBytesResolver {
    fn new(delay: Duration, bytes: Vec<u8>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            bytes,
        }
    }
}

#[async_trait]
impl Resolver for SlowBytesResolver {
    fn kind(&self) -> &str {
        "attachment"
    }

    async fn resolve(&self, _descriptor: &AttachmentDescriptor) -> Result<MediaPayload, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(MediaPayload::new(self.bytes.clone(), Some("image/png".into())))
    }
}

fn registry_with(resolver: Arc<dyn Resolver>) -> ResolverRegistry {
    let mut registry = ResolverRegistry::new();
    registry.register(resolver);
    registry
}

#[tokio::test]
async fn deadline_expiry_persists_pending_and_resumes_elsewhere() {
    init_tracing();
    let store = InMemoryCheckpointStore::new();
    let descriptor = AttachmentDescriptor::new("http://x/a.png").expect("valid URL");

    // Turn 1: the fetch is slower than the turn allows.
    {
        let slow: Arc<dyn Resolver> = Arc::new(SlowBytesResolver::new(Duration::from_secs(30), vec![1, 2, 3]));
        let registry = registry_with(Arc::clone(&slow));
        let mut turn = TurnSession::begin("convo-1", &store, &registry).expect("begin turn 1");

        let handle = turn.begin_resolution(descriptor.clone(), slow);
        let outcome = turn.resolve_within(&handle, Duration::from_millis(20)).await;
        assert!(outcome.is_none(), "deadline must elapse before the slow fetch finishes");
        assert_eq!(handle.status(), ResolutionStatus::Pending);

        turn.checkpoint(&store).expect("checkpoint turn 1");
    }

    // Turn 2 on a "different host": fresh resolver, fast this time.
    let fast = Arc::new(SlowBytesResolver::new(Duration::from_millis(1), vec![1, 2, 3]));
    let registry = registry_with(fast.clone());
    let turn = TurnSession::begin("convo-1", &store, &registry).expect("begin turn 2");

    assert_eq!(turn.handles().len(), 1);
    let handle = &turn.handles()[0];
    assert_eq!(handle.status(), ResolutionStatus::Pending, "resumption restarts from pending");
    assert_eq!(handle.descriptor(), &descriptor);

    let payload = handle.value().await.expect("resolved after resumption");
    assert_eq!(payload.bytes(), &[1, 2, 3]);
    assert_eq!(fast.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn capture_mid_resolution_round_trips_through_disk() {
    init_tracing();
    let dir = tempfile::tempdir().expect("tempdir");
    let store = JsonCheckpointStore::new(Some(dir.path().join("checkpoints.json"))).expect("store");
    let descriptor = AttachmentDescriptor::new("http://x/a.png")
        .expect("valid URL")
        .with_content_type("image/png");

    // Turn 1: checkpoint while the handle is actively resolving.
    {
        let slow: Arc<dyn Resolver> = Arc::new(SlowBytesResolver::new(Duration::from_secs(30), vec![7]));
        let registry = registry_with(Arc::clone(&slow));
        let mut turn = TurnSession::begin("convo-7", &store, &registry).expect("begin turn 1");

        let handle = turn.begin_resolution(descriptor.clone(), slow);
        let driver = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.value().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.status(), ResolutionStatus::Resolving);

        let checkpoint = turn.checkpoint(&store).expect("checkpoint while resolving");
        assert_eq!(checkpoint.envelopes[0].descriptor_payload, descriptor.encode());
        driver.abort();
    }

    // Reload from disk, as a restarted process would.
    let store = JsonCheckpointStore::new(Some(dir.path().join("checkpoints.json"))).expect("reload store");
    let fast = Arc::new(SlowBytesResolver::new(Duration::from_millis(1), vec![7]));
    let registry = registry_with(fast);
    let turn = TurnSession::begin("convo-7", &store, &registry).expect("begin turn 2");

    assert_eq!(turn.handles().len(), 1);
    let payload = turn.handles()[0].value().await.expect("resolved");
    assert_eq!(payload.bytes(), &[7]);
    assert_eq!(payload.content_type(), Some("image/png"));
}

#[tokio::test]
async fn abandoned_turn_cancels_but_next_turn_recovers() {
    init_tracing();
    let store = InMemoryCheckpointStore::new();
    let descriptor = AttachmentDescriptor::new("http://x/a.png").expect("valid URL");

    {
        let slow: Arc<dyn Resolver> = Arc::new(SlowBytesResolver::new(Duration::from_secs(30), vec![1]));
        let registry = registry_with(Arc::clone(&slow));
        let mut turn = TurnSession::begin("convo-9", &store, &registry).expect("begin");

        let handle = turn.begin_resolution(descriptor.clone(), slow);
        let driver = {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move { handle.value().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        turn.abandon();
        assert_eq!(
            driver.await.expect("join"),
            Err(HandleError::Resolution(ResolveError::Cancelled))
        );
        assert_eq!(handle.status(), ResolutionStatus::Failed);

        // Capture ignores the cancelled status; the descriptor survives.
        turn.checkpoint(&store).expect("checkpoint");
    }

    let fast = Arc::new(SlowBytesResolver::new(Duration::from_millis(1), vec![1]));
    let registry = registry_with(fast);
    let turn = TurnSession::begin("convo-9", &store, &registry).expect("begin turn 2");
    let payload = turn.handles()[0].value().await.expect("fresh handle resolves");
    assert_eq!(payload.bytes(), &[1]);
}
