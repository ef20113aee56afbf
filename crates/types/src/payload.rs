//! Resolved attachment content.

/// Bytes produced by resolving a descriptor, plus the content type the
/// resolver observed (falling back to the descriptor's hint).
///
/// Deliberately does not derive `Serialize`/`Deserialize`: payloads are
/// consumed within the turn that resolved them and recomputed after
/// resumption, never written into workflow state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaPayload {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

impl MediaPayload {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self { bytes, content_type }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_bytes_and_content_type() {
        let payload = MediaPayload::new(vec![1, 2, 3], Some("image/png".into()));
        assert_eq!(payload.bytes(), &[1, 2, 3]);
        assert_eq!(payload.content_type(), Some("image/png"));
        assert_eq!(payload.len(), 3);
        assert!(!payload.is_empty());
        assert_eq!(payload.into_bytes(), vec![1, 2, 3]);
    }
}
