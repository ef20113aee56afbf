//! # Colloquy Host
//!
//! The workflow-host side of the deferred-resolution contract: driving turns
//! and owning the save/load cycle. A [`TurnSession`] reconstructs pending
//! handles from the previous turn's checkpoint at turn start, tracks the
//! handles workflow code creates during the turn, and captures every live
//! handle back into envelopes at turn end. The [`CheckpointStore`] trait
//! abstracts where those envelope blobs live, with JSON-file and in-memory
//! backends provided.

pub mod store;
pub mod turn;

pub use store::{
    CHECKPOINT_FILE_NAME, CHECKPOINT_FORMAT_VERSION, CHECKPOINT_PATH_ENV, CheckpointStore, CheckpointStoreError,
    InMemoryCheckpointStore, JsonCheckpointStore, TurnCheckpoint,
};
pub use turn::{ReconstructionFailure, TurnSession};
