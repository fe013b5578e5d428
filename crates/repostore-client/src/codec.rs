//! Content codec.
//!
//! Converts between [`FileContent`] and the base64 transport string the
//! contents API expects. Text goes through UTF-8 on both sides; JSON values are
//! written pretty-printed with two-space indentation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use repostore_models::FileContent;

use crate::error::{StoreError, StoreResult};

/// Serialize content to the text that is stored in the repository.
pub fn to_text(content: &FileContent) -> StoreResult<String> {
    match content {
        FileContent::Json(value) => serde_json::to_string_pretty(value)
            .map_err(|e| StoreError::codec(format!("Failed to serialize content: {}", e))),
        FileContent::Text(text) => Ok(text.clone()),
    }
}

/// Encode content for a contents API write.
pub fn encode_content(content: &FileContent) -> StoreResult<String> {
    let text = to_text(content)?;
    Ok(STANDARD.encode(text.as_bytes()))
}

/// Decode a transport string into text.
///
/// The remote wraps base64 bodies at 60 columns, so ASCII whitespace is
/// stripped before decoding.
pub fn decode_text(encoded: &str) -> StoreResult<String> {
    let compact: String = encoded
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| StoreError::codec(format!("Invalid base64 content: {}", e)))?;

    String::from_utf8(bytes)
        .map_err(|e| StoreError::codec(format!("Content is not valid UTF-8: {}", e)))
}

/// Decode a transport string into structured content when possible.
pub fn decode_content(encoded: &str) -> StoreResult<FileContent> {
    decode_text(encoded).map(FileContent::parse)
}
