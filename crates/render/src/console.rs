//! Fixed-width console rendering of display units.
//!
//! Layout rules: replies are separated by one blank line, as are consecutive
//! card/media units within a reply. Card titles up to 40 columns are inlined
//! into a 60-column `=` rule; longer titles get a bare rule followed by the
//! wrapped title. Body text wraps at 60 columns with a 3-space continuation
//! indent, and image/button lists are bulleted only when they hold more than
//! one entry.

use colloquy_types::{AttachmentDescriptor, CardButton, CardImage, DisplayCard, DisplayUnit, MediaPayload};
use textwrap::{Options, word_splitters::WordSplitter};
use unicode_width::UnicodeWidthStr;

/// Total output width in columns.
pub const RENDER_WIDTH: usize = 60;

const WRAP_INDENT: &str = "   ";
const TITLE_RULE_LIMIT: usize = 40;

/// Per-invocation rendering state for one conversation's replies.
///
/// Constructed fresh for each render call site; never shared across
/// conversations.
#[derive(Debug, Default)]
pub struct RenderSession {
    reply_count: usize,
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one reply's display units, in position order, to console text.
    ///
    /// From the second reply onward the output starts with a blank separator
    /// line.
    pub fn render_reply(&mut self, units: &[DisplayUnit]) -> String {
        let mut lines: Vec<String> = Vec::new();
        if self.reply_count > 0 {
            lines.push(String::new());
        }
        self.reply_count += 1;

        let mut attachments_rendered = 0;
        for unit in units {
            match unit {
                DisplayUnit::Text { body } => lines.push(body.clone()),
                DisplayUnit::Card(card) => {
                    if attachments_rendered > 0 {
                        lines.push(String::new());
                    }
                    attachments_rendered += 1;
                    render_card(&mut lines, card);
                }
                DisplayUnit::Media {
                    content_type,
                    content_url,
                    content,
                } => {
                    if attachments_rendered > 0 {
                        lines.push(String::new());
                    }
                    attachments_rendered += 1;
                    render_media(&mut lines, content_type, content_url.as_deref(), content.as_ref());
                }
            }
        }
        lines.join("\n")
    }
}

/// Turn a resolved payload back into the display unit the renderer consumes.
///
/// The content type prefers what the resolver observed over the descriptor's
/// hint; the URL comes from the descriptor so the output names the source.
pub fn media_unit(descriptor: &AttachmentDescriptor, payload: &MediaPayload) -> DisplayUnit {
    let content_type = payload
        .content_type()
        .or(descriptor.content_type())
        .unwrap_or("application/octet-stream")
        .to_string();
    DisplayUnit::Media {
        content_type,
        content_url: Some(descriptor.content_url().to_string()),
        content: None,
    }
}

fn render_card(lines: &mut Vec<String>, card: &DisplayCard) {
    if let Some(title) = &card.title {
        if UnicodeWidthStr::width(title.as_str()) <= TITLE_RULE_LIMIT {
            lines.push(ruled_line('=', Some(title)));
        } else {
            lines.push(ruled_line('=', None));
            wrap_into(lines, title);
        }
    }
    if let Some(subtitle) = &card.subtitle {
        wrap_into(lines, subtitle);
    }
    if let Some(text) = &card.text {
        wrap_into(lines, text);
    }
    render_images(lines, &card.images);
    render_buttons(lines, &card.buttons);
}

fn render_images(lines: &mut Vec<String>, images: &[CardImage]) {
    if images.is_empty() {
        return;
    }
    lines.push(ruled_line('.', Some("images")));
    let bullet = if images.len() > 1 { "* " } else { "" };
    for image in images {
        let entry = match &image.alt {
            Some(alt) => format!("{bullet}{alt}: {}", image.url),
            None => format!("{bullet}{}", image.url),
        };
        wrap_into(lines, &entry);
    }
}

fn render_buttons(lines: &mut Vec<String>, buttons: &[CardButton]) {
    if buttons.is_empty() {
        return;
    }
    lines.push(ruled_line('.', Some("buttons")));
    let bullet = if buttons.len() > 1 { "* " } else { "" };
    for button in buttons {
        let entry = if button.title == button.value {
            format!("{bullet}{}", button.title)
        } else {
            format!("{bullet}{} [{}]", button.title, button.value)
        };
        wrap_into(lines, &entry);
    }
}

fn render_media(lines: &mut Vec<String>, content_type: &str, content_url: Option<&str>, content: Option<&serde_json::Value>) {
    lines.push(ruled_line('.', Some(content_type)));
    if let Some(url) = content_url {
        wrap_into(lines, url);
    } else if let Some(value) = content {
        lines.push(value.to_string());
    }
}

/// A 60-column rule of `fill`, optionally carrying an inlined `[title]`.
fn ruled_line(fill: char, title: Option<&str>) -> String {
    match title {
        Some(title) => {
            let mut text = String::new();
            text.push(fill);
            text.push(fill);
            text.push('[');
            text.push_str(title);
            text.push(']');
            let used = UnicodeWidthStr::width(text.as_str());
            if RENDER_WIDTH > used {
                text.extend(std::iter::repeat_n(fill, RENDER_WIDTH - used));
            }
            text
        }
        None => std::iter::repeat_n(fill, RENDER_WIDTH).collect(),
    }
}

/// Word-wrap `text` at the render width with a 3-space indent on every line.
fn wrap_into(lines: &mut Vec<String>, text: &str) {
    let options = Options::new(RENDER_WIDTH)
        .initial_indent(WRAP_INDENT)
        .subsequent_indent(WRAP_INDENT)
        .break_words(false)
        .word_splitter(WordSplitter::NoHyphenation);
    for line in textwrap::wrap(text, &options) {
        lines.push(line.into_owned());
    }
}
