//! Resolved content descriptors.

use crate::hash::BlobHash;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Price attached to a claim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub address: String,
}

/// Everything needed to locate and describe one piece of content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ContentDescriptor {
    /// The name the content was requested under (`claim_name#claim_id`).
    pub uri: String,
    pub canonical_url: String,
    pub claim_name: String,
    pub claim_id: String,
    /// Hash of the stream manifest blob.
    pub sd_hash: BlobHash,
    /// Declared plaintext size.
    pub size: Option<u64>,
    /// Declared MIME type.
    pub content_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// File name the publisher uploaded, if any.
    pub source_name: Option<String>,
    pub fee: Option<Fee>,
}

impl ContentDescriptor {
    /// Build the request URI for a claim.
    pub fn uri_for(claim_name: &str, claim_id: &str) -> String {
        format!("{claim_name}#{claim_id}")
    }

    /// True when the content carries a positive fee.
    pub fn is_paid(&self) -> bool {
        self.fee.as_ref().is_some_and(|fee| fee.amount > 0.0)
    }

    /// Identifier an access token must be bound to.
    pub fn content_id(&self) -> String {
        format!("{}/{}", self.claim_name, self.claim_id)
    }
}

/// File extension for a MIME type, used when no file name is known.
pub fn extension_for_mime(content_type: &str) -> Option<&'static str> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match essence.as_str() {
        "video/mp4" => "mp4",
        "video/webm" => "webm",
        "video/x-matroska" => "mkv",
        "video/quicktime" => "mov",
        "video/x-msvideo" => "avi",
        "video/mpeg" => "mpeg",
        "audio/mpeg" => "mp3",
        "audio/mp4" => "m4a",
        "audio/ogg" => "ogg",
        "audio/wav" | "audio/x-wav" => "wav",
        "audio/flac" => "flac",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        "text/markdown" => "md",
        "text/html" => "html",
        _ => return None,
    };
    Some(ext)
}
