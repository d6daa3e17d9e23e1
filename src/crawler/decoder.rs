//! Page decoder
//!
//! Turns a page body into the ordered list of pins it carries. Only the
//! fields needed for exporting are read; everything else is ignored.

use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur while decoding a page
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed page payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// One pin as needed for exporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    /// Globally unique, newer pins have larger ids
    pub pin_id: u64,
    pub board_title: String,
    pub bucket: String,
    /// Asset key on the CDN
    pub key: String,
    pub mime_type: String,
    /// Source link embedded into the saved image
    pub link: String,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    #[serde(default)]
    pins: Option<Vec<PinPayload>>,
}

// `null` and missing string fields both read as empty, so one sparse pin
// does not sink the whole page.
#[derive(Debug, Deserialize)]
struct PinPayload {
    pin_id: u64,
    #[serde(default)]
    board: Option<BoardPayload>,
    file: FilePayload,
    #[serde(default)]
    link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BoardPayload {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FilePayload {
    #[serde(default)]
    bucket: Option<String>,
    key: String,
    #[serde(rename = "type", default)]
    mime_type: Option<String>,
}

impl From<PinPayload> for PinRecord {
    fn from(pin: PinPayload) -> Self {
        Self {
            pin_id: pin.pin_id,
            board_title: pin.board.and_then(|b| b.title).unwrap_or_default(),
            bucket: pin.file.bucket.unwrap_or_default(),
            key: pin.file.key,
            mime_type: pin.file.mime_type.unwrap_or_default(),
            link: pin.link.unwrap_or_default(),
        }
    }
}

/// Decodes a page body into pins, preserving page order
///
/// An empty list is a valid page and marks the end of the collection.
///
/// # Errors
///
/// Returns `DecodeError` when the body is not the expected
/// `{user:{pins:[...]}}` shape, or a pin lacks its `pin_id` or `file.key`.
pub fn decode_page(body: &str) -> Result<Vec<PinRecord>, DecodeError> {
    let page: PageResponse = serde_json::from_str(body)?;
    Ok(page
        .user
        .pins
        .unwrap_or_default()
        .into_iter()
        .map(PinRecord::from)
        .collect())
}
