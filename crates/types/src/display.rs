//! Display units consumed by the channel renderer.
//!
//! A reply is an ordered sequence of units; the renderer formats them in
//! position order with no suspend points of its own. Units reference already
//! resolved content only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One positioned element of an outgoing reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayUnit {
    /// Plain text segment.
    Text { body: String },
    /// Structured card with title, body text, images, and buttons.
    Card(DisplayCard),
    /// Opaque media reference: either a URL or inline structured content.
    Media {
        content_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        content_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        content: Option<Value>,
    },
}

impl DisplayUnit {
    pub fn text(body: impl Into<String>) -> Self {
        Self::Text { body: body.into() }
    }
}

/// Card-like payload mirroring hero/thumbnail channel cards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayCard {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<CardImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<CardButton>,
}

/// Image slot on a card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alt: Option<String>,
}

/// Action button on a card.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CardButton {
    pub title: String,
    pub value: String,
}
