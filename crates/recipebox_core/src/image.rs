//! Recipe image encoding helpers.
//!
//! # Responsibility
//! - Build and parse `data:<mime>;base64,<payload>` URIs.
//! - Estimate decoded image size so oversized images can be flagged.
//!
//! Resizing/compression is not done here.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;

/// Decoded-size threshold above which an image should be compressed.
pub const DEFAULT_MAX_IMAGE_KB: u64 = 500;

static DATA_URI_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:([a-zA-Z0-9][a-zA-Z0-9.+-]*/[a-zA-Z0-9][a-zA-Z0-9.+-]*);base64,(.*)$")
        .expect("valid data uri regex")
});

/// Image handling failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// Input is not a base64 data URI.
    NotDataUri,
    InvalidBase64(String),
    /// File extension does not map to a known image type.
    UnsupportedExtension(String),
}

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDataUri => write!(f, "value is not a base64 data uri"),
            Self::InvalidBase64(message) => write!(f, "invalid base64 payload: {message}"),
            Self::UnsupportedExtension(ext) => write!(f, "unsupported image extension `{ext}`"),
        }
    }
}

impl Error for ImageError {}

/// Decoded data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri {
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Encodes raw bytes as a base64 data URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Parses and decodes a base64 data URI. Line breaks in the payload are ignored.
pub fn parse_data_uri(value: &str) -> Result<DataUri, ImageError> {
    let caps = DATA_URI_RE
        .captures(value.trim())
        .ok_or(ImageError::NotDataUri)?;
    let mime = caps.get(1).map_or("", |m| m.as_str()).to_ascii_lowercase();
    let payload: String = caps
        .get(2)
        .map_or("", |m| m.as_str())
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(payload)
        .map_err(|err| ImageError::InvalidBase64(err.to_string()))?;
    Ok(DataUri { mime, bytes })
}

/// Returns whether the value is a data URI (as opposed to a URL).
pub fn is_data_uri(value: &str) -> bool {
    DATA_URI_RE.is_match(value.trim())
}

/// Estimates decoded size in KB from the base64 payload length.
///
/// URLs report 0 since their bytes are not stored locally.
pub fn estimated_size_kb(value: &str) -> u64 {
    let Some(caps) = DATA_URI_RE.captures(value.trim()) else {
        return 0;
    };
    let payload_len = caps.get(2).map_or(0, |m| {
        m.as_str()
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .count()
    }) as u64;
    payload_len * 3 / 4 / 1024
}

/// Returns whether the estimated size exceeds `max_kb`.
pub fn needs_compression(value: &str, max_kb: u64) -> bool {
    estimated_size_kb(value) > max_kb
}

/// Guesses the image MIME type from a file extension.
pub fn mime_for_path(path: &Path) -> Result<&'static str, ImageError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        "svg" => Ok("image/svg+xml"),
        other => Err(ImageError::UnsupportedExtension(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        encode_data_uri, estimated_size_kb, is_data_uri, mime_for_path, needs_compression,
        parse_data_uri, ImageError,
    };
    use std::path::Path;

    #[test]
    fn encode_then_parse_preserves_mime_and_bytes() {
        let uri = encode_data_uri("image/png", &[0x89, 0x50, 0x4e, 0x47]);
        assert!(uri.starts_with("data:image/png;base64,"));
        let parsed = parse_data_uri(&uri).unwrap();
        assert_eq!(parsed.mime, "image/png");
        assert_eq!(parsed.bytes, vec![0x89, 0x50, 0x4e, 0x47]);
    }

    #[test]
    fn urls_are_not_data_uris() {
        let url = "https://picsum.photos/800/600?random=1";
        assert!(!is_data_uri(url));
        assert_eq!(parse_data_uri(url), Err(ImageError::NotDataUri));
        assert_eq!(estimated_size_kb(url), 0);
    }

    #[test]
    fn size_estimate_flags_large_images() {
        let uri = encode_data_uri("image/jpeg", &vec![0u8; 600 * 1024]);
        assert!(estimated_size_kb(&uri) >= 599);
        assert!(needs_compression(&uri, 500));
        assert!(!needs_compression(&uri, 700));
    }

    #[test]
    fn mime_guess_uses_extension() {
        assert_eq!(mime_for_path(Path::new("a/b/Photo.JPG")), Ok("image/jpeg"));
        assert!(mime_for_path(Path::new("notes.txt")).is_err());
    }

    #[test]
    fn wrapped_payload_is_recognized_and_decoded() {
        let uri = encode_data_uri("image/gif", b"GIF89a wrapped payload");
        let (head, payload) = uri.split_once(',').unwrap();
        let (first, rest) = payload.split_at(8);
        let wrapped = format!("{head},{first}\r\n{rest}\n");

        assert!(is_data_uri(&wrapped));
        assert_eq!(parse_data_uri(&wrapped).unwrap().bytes, b"GIF89a wrapped payload");
        assert_eq!(estimated_size_kb(&wrapped), estimated_size_kb(&uri));
    }
}
