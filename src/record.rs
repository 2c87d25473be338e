//! The line record — the unit of data flowing between pipeline stages.

use bytes::Bytes;
use std::borrow::Cow;

/// One logical line, including its verbatim terminator (`\n` or `\r\n`).
///
/// The final record of a stream may carry no terminator if the source ended
/// without one. Backed by [`Bytes`], so cloning is cheap and slices handed
/// out by the framer share the source buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineRecord {
    bytes: Bytes,
}

impl LineRecord {
    /// Wrap raw line bytes (terminator included, if any).
    pub fn new(bytes: Bytes) -> Self {
        Self { bytes }
    }

    /// Build a record from text, preserving whatever terminator it carries.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            bytes: Bytes::from(text.into()),
        }
    }

    /// Full line bytes, terminator included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Line content without the terminator.
    pub fn content(&self) -> &[u8] {
        &self.bytes[..self.bytes.len() - self.terminator().len()]
    }

    /// The verbatim terminator: `"\n"`, `"\r\n"`, or `""` for a
    /// terminator-less final record.
    pub fn terminator(&self) -> &[u8] {
        if self.bytes.ends_with(b"\r\n") {
            b"\r\n"
        } else if self.bytes.ends_with(b"\n") {
            b"\n"
        } else {
            b""
        }
    }

    /// Content as text (lossy for non-UTF-8 input), terminator excluded.
    /// Predicates and mappers see this view.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.content())
    }

    /// Replace the content while keeping this record's terminator verbatim.
    /// If `text` already ends with a terminator, it is used as-is.
    pub fn with_text(&self, text: &str) -> Self {
        if text.ends_with('\n') {
            return Self::from_text(text.to_string());
        }
        let mut out = Vec::with_capacity(text.len() + self.terminator().len());
        out.extend_from_slice(text.as_bytes());
        out.extend_from_slice(self.terminator());
        Self {
            bytes: Bytes::from(out),
        }
    }

    /// Consume the record, yielding its full bytes.
    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl From<&str> for LineRecord {
    fn from(s: &str) -> Self {
        Self::from_text(s)
    }
}

impl From<Bytes> for LineRecord {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminator_variants() {
        assert_eq!(LineRecord::from("a\n").terminator(), b"\n");
        assert_eq!(LineRecord::from("a\r\n").terminator(), b"\r\n");
        assert_eq!(LineRecord::from("a").terminator(), b"");
    }

    #[test]
    fn content_excludes_terminator() {
        assert_eq!(LineRecord::from("abc\r\n").content(), b"abc");
        assert_eq!(LineRecord::from("abc").content(), b"abc");
        assert_eq!(LineRecord::from("\n").content(), b"");
    }

    #[test]
    fn with_text_preserves_terminator() {
        let rec = LineRecord::from("abc\r\n");
        assert_eq!(rec.with_text("xyz").as_bytes(), b"xyz\r\n");
        let bare = LineRecord::from("abc");
        assert_eq!(bare.with_text("xyz").as_bytes(), b"xyz");
    }
}
