//! # Colloquy Engine
//!
//! The resumable deferred-resolution primitive at the heart of the colloquy
//! runtime. Workflow code asks for an external value by descriptor; the
//! engine resolves it asynchronously through a caller-supplied [`Resolver`]
//! and tracks the attempt in a [`DeferredAttachment`] handle. If the turn
//! ends before resolution finishes, the handle is captured into a
//! [`ResumptionEnvelope`](colloquy_types::ResumptionEnvelope) holding the
//! descriptor only; the next turn reconstructs a fresh pending handle and
//! retries the work from scratch.
//!
//! ## Architecture
//!
//! - **`resolver`**: the [`Resolver`] contract and its error type
//! - **`handle`**: the [`DeferredAttachment`] state machine
//!   (Pending → Resolving → Resolved | Failed)
//! - **`envelope`**: capture and the [`ResolverRegistry`] that rebinds
//!   resolvers to persisted envelopes
//! - **`http`**: the stock HTTP-backed attachment resolver
//!
//! The one rule everything else follows: serialize the descriptor, never the
//! live operation. A handle captured while resolving produces the same
//! envelope as one captured while pending.

pub mod envelope;
pub mod handle;
pub mod http;
pub mod resolver;

pub use envelope::{EnvelopeError, ResolverRegistry, capture};
pub use handle::{DeferredAttachment, HandleError, ResolutionStatus};
pub use http::HttpAttachmentResolver;
pub use resolver::{ResolveError, Resolver};
