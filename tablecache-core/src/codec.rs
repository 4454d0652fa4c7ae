//! Reversible string encodings for cache values.
//!
//! Cache values are dynamic JSON values. A codec turns them into the string
//! stored in the table's value column and back again. Decoding a payload
//! written by a different codec is a caller error and surfaces as
//! [`CodecError::Decode`].

use std::fmt;

use serde_json::Value;

use crate::error::{CacheResult, CodecError};

/// Encode/decode contract for cache payloads.
///
/// `decode(encode(v)) == v` must hold for every value the application stores.
pub trait ValueCodec: fmt::Debug + Send + Sync {
    /// Short codec name, used in error messages.
    fn name(&self) -> &'static str;

    /// Encode a value into its stored string form.
    fn encode(&self, value: &Value) -> String;

    /// Decode a stored string back into a value.
    fn decode(&self, raw: &str) -> CacheResult<Value>;
}

/// Default codec: compact JSON text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> String {
        value.to_string()
    }

    fn decode(&self, raw: &str) -> CacheResult<Value> {
        serde_json::from_str(raw).map_err(|e| {
            CodecError::Decode {
                codec: self.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// Hex-encoded JSON, for tables that must only ever see ASCII payloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HexCodec;

impl ValueCodec for HexCodec {
    fn name(&self) -> &'static str {
        "hex"
    }

    fn encode(&self, value: &Value) -> String {
        hex::encode(value.to_string())
    }

    fn decode(&self, raw: &str) -> CacheResult<Value> {
        let bytes = hex::decode(raw).map_err(|e| CodecError::Decode {
            codec: self.name().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            CodecError::Decode {
                codec: self.name().to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_codec_encodes_compact_json() {
        let encoded = JsonCodec.encode(&json!({"name": "a"}));
        assert_eq!(encoded, r#"{"name":"a"}"#);
    }

    #[test]
    fn test_json_codec_roundtrip_scalars() {
        for value in [json!(null), json!(true), json!(42), json!(-1.5), json!("text")] {
            let encoded = JsonCodec.encode(&value);
            assert_eq!(JsonCodec.decode(&encoded).unwrap(), value);
        }
    }

    #[test]
    fn test_json_codec_keeps_float_bits() {
        for f in [f64::from_bits(1_270_595_688_944_589_581), 0.1, f64::MIN_POSITIVE, f64::MAX] {
            let decoded = JsonCodec.decode(&JsonCodec.encode(&json!(f))).unwrap();
            assert_eq!(decoded.as_f64().map(f64::to_bits), Some(f.to_bits()));
        }
    }

    #[test]
    fn test_json_codec_rejects_garbage() {
        let err = JsonCodec.decode("{not json").unwrap_err();
        assert!(matches!(err, crate::CacheError::Codec(CodecError::Decode { .. })));
    }

    #[test]
    fn test_hex_codec_is_ascii_hex() {
        let encoded = HexCodec.encode(&json!({"emoji": "\u{1F600}"}));
        assert!(encoded.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(HexCodec.decode(&encoded).unwrap(), json!({"emoji": "\u{1F600}"}));
    }

    #[test]
    fn test_hex_codec_rejects_json_payload() {
        let json_payload = JsonCodec.encode(&json!([1, 2, 3]));
        assert!(HexCodec.decode(&json_payload).is_err());
    }
}
