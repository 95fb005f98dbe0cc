/// File fingerprints and the descriptive metadata sent alongside them.
///
/// A fingerprint is the lowercase hex SHA-256 digest of a file's exact
/// bytes. It is the primary key of a proof record on the backend: the same
/// bytes always produce the same fingerprint and therefore the same record.
/// The file itself never leaves the machine.
pub mod source;

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::crypto::hash::HEX_DIGEST_LEN;
use crate::error::{ProofError, Result};

pub use source::{ByteSource, LocalFile, MemorySource, SelectedFile};

/// MIME type reported when neither the host nor the extension table knows better.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Returns true if `input` is exactly 64 hex characters (any case).
pub fn is_valid_digest(input: &str) -> bool {
    input.len() == HEX_DIGEST_LEN && input.bytes().all(|b| b.is_ascii_hexdigit())
}

/// A validated, lowercase, 64-character hex SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Parse a user-supplied digest. Case-insensitive; the result is lowercased.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if !is_valid_digest(trimmed) {
            return Err(ProofError::InvalidFingerprint(
                "expected 64 hexadecimal characters".to_string(),
            ));
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 8 hex characters, for file names and log lines.
    pub fn short(&self) -> &str {
        &self.0[..8]
    }

    /// The digest split into two 32-character halves.
    pub fn split_halves(&self) -> (&str, &str) {
        self.0.split_at(HEX_DIGEST_LEN / 2)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Fingerprint::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Descriptive metadata supplied at registration time.
///
/// Not verified against the digest; the backend stores it as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    pub mime_type: String,
}

impl FileDescriptor {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<String>) -> Self {
        let name = name.into();
        let mime_type = mime_type
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| guess_mime_type(&name).to_string());
        Self {
            name,
            size,
            mime_type,
        }
    }
}

/// Best-effort MIME type from a file name's extension.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        Some("html") | Some("htm") => "text/html",
        Some("json") => "application/json",
        Some("zip") => "application/zip",
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => DEFAULT_MIME_TYPE,
    }
}
