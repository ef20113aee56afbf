//! # Colloquy Render
//!
//! Console channel renderer: a pure formatting pass over already-resolved
//! display units. Rendering has no suspend points and holds no process-wide
//! state; the reply separator counter lives in a per-invocation
//! [`RenderSession`], so concurrent conversations can render independently.

pub mod console;

pub use console::{RENDER_WIDTH, RenderSession, media_unit};
