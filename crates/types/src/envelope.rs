//! The serialized stand-in for a deferred attachment.
//!
//! A [`ResumptionEnvelope`] captures only the descriptor, never the in-flight
//! operation or a resolved payload. An envelope written while a handle was
//! mid-resolution is byte-identical to one written while it was still
//! pending; resumption always restarts the work from the descriptor.

use serde::{Deserialize, Serialize};

/// Envelope encoding version accepted by the current loaders.
pub const ENVELOPE_SCHEMA_VERSION: u32 = 1;

/// Self-describing, versioned record persisted between turns.
///
/// `descriptor_kind` selects which resolver the host re-binds on
/// reconstruction; `descriptor_payload` is the descriptor's own durable
/// encoding and is opaque at this layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumptionEnvelope {
    pub schema_version: u32,
    pub descriptor_kind: String,
    pub descriptor_payload: String,
}

impl ResumptionEnvelope {
    /// Build an envelope at the current schema version.
    pub fn new(descriptor_kind: impl Into<String>, descriptor_payload: String) -> Self {
        Self {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            descriptor_kind: descriptor_kind.into(),
            descriptor_payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_envelope_uses_current_schema_version() {
        let envelope = ResumptionEnvelope::new("attachment", "{}".into());
        assert_eq!(envelope.schema_version, ENVELOPE_SCHEMA_VERSION);
        assert_eq!(envelope.descriptor_kind, "attachment");
    }

    #[test]
    fn envelope_serde_round_trip() {
        let envelope = ResumptionEnvelope::new("attachment", r#"{"content_url":"http://x/a.png"}"#.into());
        let json = serde_json::to_string(&envelope).expect("serialize");
        let back: ResumptionEnvelope = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, envelope);
    }
}
