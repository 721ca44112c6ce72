use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::syntax::Span;

/// Immutable component source for one editing session
///
/// Every accepted edit produces a new document; the digest names the exact
/// text derived artefacts (trees, addresses, results) were computed from.
#[derive(Clone, PartialEq, Eq)]
pub struct SourceDocument {
    text: Arc<str>,
    digest: String,
}

impl SourceDocument {
    pub fn new(text: impl Into<String>) -> Self {
        let text: String = text.into();
        let digest = content_digest(&text);
        Self {
            text: Arc::from(text),
            digest,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// SHA-256 of the text, lowercase hex
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// New document with `span` replaced by `with`
    pub fn splice(&self, span: Span, with: &str) -> SourceDocument {
        let mut text = String::with_capacity(self.text.len() + with.len());
        text.push_str(&self.text[..span.start]);
        text.push_str(with);
        text.push_str(&self.text[span.end..]);
        SourceDocument::new(text)
    }
}

impl Default for SourceDocument {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceDocument")
            .field("len", &self.text.len())
            .field("digest", &&self.digest[..12])
            .finish()
    }
}

impl From<&str> for SourceDocument {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceDocument {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

/// SHA-256 of `text`, lowercase hex
pub fn content_digest(text: &str) -> String {
    Sha256::digest(text.as_bytes())
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A saved component at the storage boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentRecord {
    pub id: Uuid,
    pub code: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_sha256_hex() {
        let doc = SourceDocument::new("");
        assert_eq!(
            doc.digest(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert!(doc.is_empty());
    }

    #[test]
    fn test_splice_builds_new_document() {
        let doc = SourceDocument::from("<p>old</p>");
        let next = doc.splice(Span::new(3, 6), "new");
        assert_eq!(next.text(), "<p>new</p>");
        assert_eq!(doc.text(), "<p>old</p>");
        assert_ne!(doc.digest(), next.digest());
        assert_eq!(next, SourceDocument::from("<p>new</p>"));
    }

    #[test]
    fn test_content_digest_matches_document() {
        let doc = SourceDocument::from("<p>x</p>");
        assert_eq!(content_digest("<p>x</p>"), doc.digest());
        assert_ne!(content_digest("<p>y</p>"), doc.digest());
    }
}
