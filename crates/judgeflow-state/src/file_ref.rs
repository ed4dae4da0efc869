//! Stored document references
//!
//! A `FileRef` names a submission document by owner and filename. Both
//! components are kept fully decoded; encoding happens exactly once when a
//! request URL is built. Input that arrives partially or repeatedly
//! percent-encoded is decoded until stable first, so a reference never
//! ends up double-encoded.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Characters left unescaped by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Upper bound on nested encodings unwrapped by [`decode_fully`].
const MAX_DECODE_ROUNDS: usize = 8;

/// Decode percent-escapes until the string stops changing.
///
/// Escapes that do not form valid UTF-8 are left untouched.
pub fn decode_fully(raw: &str) -> String {
    let mut current = raw.to_string();
    for _ in 0..MAX_DECODE_ROUNDS {
        let decoded = match percent_decode_str(&current).decode_utf8() {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => break,
        };
        if decoded == current {
            break;
        }
        current = decoded;
    }
    current
}

/// Percent-encode one path component with the `encodeURIComponent` alphabet.
pub fn encode_component(decoded: &str) -> String {
    utf8_percent_encode(decoded, URI_COMPONENT).to_string()
}

/// Document kind inferred from the filename extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Word,
    Unknown,
}

impl FileKind {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            FileKind::Pdf
        } else if lower.ends_with(".doc") || lower.ends_with(".docx") {
            FileKind::Word
        } else {
            FileKind::Unknown
        }
    }

    /// MIME type served for this file.
    pub fn content_type(name: &str) -> &'static str {
        let lower = name.to_lowercase();
        if lower.ends_with(".pdf") {
            "application/pdf"
        } else if lower.ends_with(".docx") {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        } else if lower.ends_with(".doc") {
            "application/msword"
        } else {
            "application/octet-stream"
        }
    }
}

#[derive(Deserialize)]
struct FileRefParts {
    owner: String,
    name: String,
}

/// Reference to a stored submission document (owner + filename, decoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "FileRefParts")]
pub struct FileRef {
    owner: String,
    name: String,
}

impl FileRef {
    /// Build a reference, fully decoding both components.
    pub fn new(owner: &str, name: &str) -> Self {
        Self {
            owner: decode_fully(owner),
            name: decode_fully(name),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FileKind {
        FileKind::from_name(&self.name)
    }

    /// Request path `{base}{prefix}/{owner}/{name}` with a single encoding
    /// pass per component. `base` may be empty for same-origin paths.
    pub fn url(&self, base: &str, route_prefix: &str) -> String {
        let base = base.trim_end_matches('/');
        let prefix = route_prefix.trim_end_matches('/');
        let slash = if prefix.starts_with('/') { "" } else { "/" };
        format!(
            "{base}{slash}{prefix}/{}/{}",
            encode_component(&self.owner),
            encode_component(&self.name)
        )
    }
}

impl From<FileRefParts> for FileRef {
    fn from(parts: FileRefParts) -> Self {
        FileRef::new(&parts.owner, &parts.name)
    }
}
