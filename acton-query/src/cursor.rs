//! Opaque cursor encoding
//!
//! A cursor is the JSON form of a [`CursorToken`] wrapped in base64url. Clients
//! must treat it as opaque: only `decode(encode(x)) == x` is guaranteed, not
//! any ordering of the encoded strings.
//!
//! # Example
//!
//! ```rust
//! use acton_query::{cursor, CursorToken};
//!
//! let token = CursorToken::from_id(42);
//! let encoded = cursor::encode(&token);
//! assert_eq!(cursor::decode(&encoded).unwrap(), token);
//! assert_eq!(cursor::extract_id(&encoded), 42);
//! assert_eq!(cursor::extract_id("not-base64!!"), 0);
//! ```

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};

use crate::error::{Error, Result};
use crate::model::CursorToken;

/// URL-safe alphabet; emits padding but accepts tokens with or without it
const CURSOR_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encode a cursor token
pub fn encode(token: &CursorToken) -> String {
    // A struct of plain fields always serializes.
    let json = serde_json::to_vec(token).unwrap_or_default();
    CURSOR_ENGINE.encode(json)
}

/// Decode a cursor token
///
/// # Errors
///
/// Returns [`Error::InvalidCursor`] if the token is not base64url or the
/// payload is not a cursor object.
pub fn decode(token: &str) -> Result<CursorToken> {
    let bytes = CURSOR_ENGINE
        .decode(token.trim())
        .map_err(|e| Error::InvalidCursor(format!("not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| Error::InvalidCursor(format!("malformed payload: {e}")))
}

/// Id carried by a cursor, or 0 when it does not decode
#[must_use]
pub fn extract_id(token: &str) -> i64 {
    decode(token).map(|cursor| cursor.id).unwrap_or(0)
}

/// Encode a cursor that records only `id`; 0 means "no row" and yields `None`
#[must_use]
pub fn encode_id(id: i64) -> Option<String> {
    (id != 0).then(|| encode(&CursorToken::from_id(id)))
}
