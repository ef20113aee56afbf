//! # Colloquy Types
//!
//! Shared data types for the colloquy conversational-workflow runtime.
//! Everything here is plain data: the durable [`AttachmentDescriptor`] and the
//! [`ResumptionEnvelope`] that carries it across persistence boundaries, the
//! ephemeral [`MediaPayload`] produced by resolution, and the display units
//! the channel renderer consumes.
//!
//! The split between durable and ephemeral types is deliberate. Descriptors
//! and envelopes derive `Serialize`/`Deserialize` and obey a round-trip law;
//! payloads do not derive either, so resolved bytes can never leak into
//! persisted workflow state by accident.

pub mod descriptor;
pub mod display;
pub mod envelope;
pub mod payload;

pub use descriptor::{ATTACHMENT_DESCRIPTOR_KIND, AttachmentDescriptor, DescriptorError};
pub use display::{CardButton, CardImage, DisplayCard, DisplayUnit};
pub use envelope::{ENVELOPE_SCHEMA_VERSION, ResumptionEnvelope};
pub use payload::MediaPayload;
