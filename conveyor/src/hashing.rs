//! Content hashing for idempotency checks.
//!
//! Digests are computed over canonicalized content so that cosmetic edits
//! (line endings, trailing whitespace, container metadata) do not force a
//! stage to recompute. Collaborators choose their own canonical form; the
//! helpers here cover the common text case.

use sha2::{Digest, Sha256};

/// Computes a stable digest over raw bytes.
///
/// The digest is the first 16 bytes of a SHA-256, hex encoded, which is
/// plenty for equality comparison while keeping provenance files readable.
#[must_use]
pub fn content_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..16])
}

/// Computes the digest of a template/prompt version string.
#[must_use]
pub fn template_digest(version: &str) -> String {
    content_digest(version.as_bytes())
}

/// Canonicalizes text content for hashing.
///
/// Strips a UTF-8 BOM, normalizes CRLF to LF, and trims trailing whitespace
/// per line, so metadata-only edits made by editors or transfer tools hash
/// identically to the original.
#[must_use]
pub fn canonical_text(bytes: &[u8]) -> Vec<u8> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let mut canonical = String::with_capacity(text.len());
    for line in text.split('\n') {
        canonical.push_str(line.trim_end());
        canonical.push('\n');
    }
    // The split above always yields a final (possibly empty) segment.
    canonical.pop();
    canonical.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_is_stable() {
        let a = content_digest(b"transcript body");
        let b = content_digest(b"transcript body");
        let c = content_digest(b"different body");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn template_digest_differs_per_version() {
        assert_ne!(template_digest("translate/v3"), template_digest("translate/v4"));
    }

    #[test]
    fn canonical_text_ignores_line_endings() {
        let unix = canonical_text(b"line one\nline two\n");
        let dos = canonical_text(b"line one\r\nline two\r\n");

        assert_eq!(unix, dos);
        assert_eq!(content_digest(&unix), content_digest(&dos));
    }

    #[test]
    fn canonical_text_ignores_trailing_whitespace() {
        let clean = canonical_text(b"hello\nworld");
        let padded = canonical_text(b"hello   \nworld\t");

        assert_eq!(clean, padded);
    }

    #[test]
    fn canonical_text_strips_bom() {
        let with_bom = canonical_text("\u{feff}hello".as_bytes());
        assert_eq!(with_bom, b"hello");
    }

    #[test]
    fn semantic_change_still_changes_digest() {
        let before = canonical_text(b"take one");
        let after = canonical_text(b"take two");

        assert_ne!(content_digest(&before), content_digest(&after));
    }
}
