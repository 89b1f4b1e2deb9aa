//! Pagination cursor codec (§6, property P8).
//!
//! The two coexisting pagination schemes (`{limit, offset}` and
//! `{limit, cursor}`) are isomorphic: a cursor is just the base64url
//! encoding of `{"offset": n}`.

use crate::error::{GatewayError, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub offset: u64,
}

pub fn encode_cursor(offset: u64) -> String {
    let json = serde_json::to_vec(&Cursor { offset }).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode_cursor(cursor: &str) -> Result<Cursor> {
    let bytes = URL_SAFE_NO_PAD
        .decode(cursor)
        .map_err(|e| GatewayError::InvalidCursor(e.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidCursor(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn property_p8_round_trip() {
        for offset in [0u64, 1, 20, 100, 987_654] {
            let encoded = encode_cursor(offset);
            let decoded = decode_cursor(&encoded).unwrap();
            assert_eq!(decoded.offset, offset);
        }
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_cursor("not-a-cursor!!").is_err());
    }
}
