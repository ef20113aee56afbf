//! Checkpoint persistence for conversation state.
//!
//! This module exposes an abstraction for storing and retrieving per
//! conversation turn checkpoints, along with a JSON-backed implementation
//! (tilde expansion, env override, config directory fallback) and an
//! in-memory implementation for tests. The checkpoint content is the
//! envelope list plus a timestamp; it is opaque to the engine.

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::serde::ts_seconds;
use chrono::{DateTime, SubsecRound, Utc};
use colloquy_types::ResumptionEnvelope;
use dirs_next::{config_dir, home_dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Environment variable controlling the checkpoint file location.
pub const CHECKPOINT_PATH_ENV: &str = "COLLOQUY_CHECKPOINT_PATH";

/// Default filename for the persisted checkpoint store.
pub const CHECKPOINT_FILE_NAME: &str = "checkpoints.json";

/// On-disk format version written by this process.
pub const CHECKPOINT_FORMAT_VERSION: u32 = 1;

/// Errors surfaced by checkpoint store operations.
#[derive(Debug, Error)]
pub enum CheckpointStoreError {
    /// I/O failure while reading or writing the checkpoint file.
    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable state persisted for one conversation at the end of a turn.
///
/// Holds envelopes only; resolved payloads are never part of a checkpoint
/// and are recomputed after resumption.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TurnCheckpoint {
    pub envelopes: Vec<ResumptionEnvelope>,
    #[serde(with = "ts_seconds")]
    pub saved_at: DateTime<Utc>,
}

impl TurnCheckpoint {
    pub fn new(envelopes: Vec<ResumptionEnvelope>) -> Self {
        Self {
            envelopes,
            // Whole seconds only, matching the ts_seconds encoding, so a
            // checkpoint compares equal to its own disk round-trip.
            saved_at: Utc::now().trunc_subsecs(0),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct CheckpointFile {
    format_version: u32,
    conversations: HashMap<String, TurnCheckpoint>,
}

impl Default for CheckpointFile {
    fn default() -> Self {
        Self {
            format_version: CHECKPOINT_FORMAT_VERSION,
            conversations: HashMap::new(),
        }
    }
}

/// Shared trait implemented by checkpoint persistence backends.
pub trait CheckpointStore: Send + Sync {
    /// Persist the checkpoint for a conversation, replacing any previous one.
    fn save(&self, conversation_id: &str, checkpoint: TurnCheckpoint) -> Result<(), CheckpointStoreError>;

    /// Load the latest checkpoint for a conversation, if any.
    fn load(&self, conversation_id: &str) -> Result<Option<TurnCheckpoint>, CheckpointStoreError>;

    /// Drop the checkpoint for a conversation.
    fn clear(&self, conversation_id: &str) -> Result<(), CheckpointStoreError>;
}

/// JSON-backed checkpoint store persisted on disk.
pub struct JsonCheckpointStore {
    path: PathBuf,
    file: Mutex<CheckpointFile>,
}

impl JsonCheckpointStore {
    /// Create a new store at the provided path (or the default path when omitted).
    pub fn new<P: Into<Option<PathBuf>>>(path: P) -> Result<Self, CheckpointStoreError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde_path(path),
            None => default_checkpoint_path(),
        };

        let file = load_checkpoint_file(&resolved_path)?;
        Ok(Self {
            path: resolved_path,
            file: Mutex::new(file),
        })
    }

    /// Initialize a store using the default settings.
    pub fn with_defaults() -> Result<Self, CheckpointStoreError> {
        Self::new(None::<PathBuf>)
    }

    /// Access the underlying checkpoint path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_locked(&self, file: &CheckpointFile) -> Result<(), CheckpointStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl CheckpointStore for JsonCheckpointStore {
    fn save(&self, conversation_id: &str, checkpoint: TurnCheckpoint) -> Result<(), CheckpointStoreError> {
        let mut file = self.file.lock().expect("checkpoint lock poisoned");
        file.format_version = CHECKPOINT_FORMAT_VERSION;
        file.conversations.insert(conversation_id.to_string(), checkpoint);
        self.save_locked(&file)
    }

    fn load(&self, conversation_id: &str) -> Result<Option<TurnCheckpoint>, CheckpointStoreError> {
        let file = self.file.lock().expect("checkpoint lock poisoned");
        Ok(file.conversations.get(conversation_id).cloned())
    }

    fn clear(&self, conversation_id: &str) -> Result<(), CheckpointStoreError> {
        let mut file = self.file.lock().expect("checkpoint lock poisoned");
        file.conversations.remove(conversation_id);
        self.save_locked(&file)
    }
}

/// In-memory checkpoint store primarily used for unit testing.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    conversations: Mutex<HashMap<String, TurnCheckpoint>>,
}

impl InMemoryCheckpointStore {
    /// Create an empty in-memory checkpoint store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for InMemoryCheckpointStore {
    fn save(&self, conversation_id: &str, checkpoint: TurnCheckpoint) -> Result<(), CheckpointStoreError> {
        let mut conversations = self.conversations.lock().expect("checkpoint lock poisoned");
        conversations.insert(conversation_id.to_string(), checkpoint);
        Ok(())
    }

    fn load(&self, conversation_id: &str) -> Result<Option<TurnCheckpoint>, CheckpointStoreError> {
        let conversations = self.conversations.lock().expect("checkpoint lock poisoned");
        Ok(conversations.get(conversation_id).cloned())
    }

    fn clear(&self, conversation_id: &str) -> Result<(), CheckpointStoreError> {
        let mut conversations = self.conversations.lock().expect("checkpoint lock poisoned");
        conversations.remove(conversation_id);
        Ok(())
    }
}

fn expand_tilde_path(path: PathBuf) -> PathBuf {
    if let Some(first) = path.components().next()
        && first.as_os_str() != "~"
    {
        return path;
    }

    let input = path.to_string_lossy();
    let trimmed = input.trim();

    if trimmed == "~" {
        return home_dir().unwrap_or_else(|| PathBuf::from("~"));
    }

    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home_dir().unwrap_or_else(|| PathBuf::from("~")).join(rest);
    }

    PathBuf::from(trimmed)
}

fn default_checkpoint_path() -> PathBuf {
    if let Ok(path) = env::var(CHECKPOINT_PATH_ENV)
        && !path.trim().is_empty()
    {
        return expand_tilde_path(PathBuf::from(path));
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("colloquy")
        .join(CHECKPOINT_FILE_NAME)
}

fn load_checkpoint_file(path: &Path) -> Result<CheckpointFile, CheckpointStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<CheckpointFile>(&content) {
            Ok(file) if file.format_version <= CHECKPOINT_FORMAT_VERSION => Ok(file),
            Ok(file) => {
                warn!(
                    path = %path.display(),
                    format_version = file.format_version,
                    "checkpoint file written by a newer format; starting empty"
                );
                Ok(CheckpointFile::default())
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "failed to parse checkpoint file; starting empty");
                Ok(CheckpointFile::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(CheckpointFile::default()),
        Err(error) => Err(CheckpointStoreError::Io(error)),
    }
}
