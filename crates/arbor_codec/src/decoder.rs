//! Strict CBOR decoder.

use crate::encoder::to_canonical_cbor;
use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as CborValue;

/// Decode a value from CBOR bytes.
///
/// The input must hold exactly one item in canonical form. Floats, tags and
/// integers outside the `i64` range are rejected.
///
/// # Errors
///
/// Returns an error if the bytes are malformed, contain unsupported types,
/// are followed by trailing bytes or are not canonically encoded.
pub fn from_cbor(bytes: &[u8]) -> CodecResult<Value> {
    let mut remaining = bytes;
    let item: CborValue = ciborium::from_reader(&mut remaining)
        .map_err(|e| CodecError::decoding_failed(e.to_string()))?;
    if !remaining.is_empty() {
        return Err(CodecError::TrailingBytes {
            count: remaining.len(),
        });
    }

    let value = from_cbor_value(item)?;
    if to_canonical_cbor(&value)? != bytes {
        return Err(CodecError::NonCanonical);
    }
    Ok(value)
}

fn from_cbor_value(item: CborValue) -> CodecResult<Value> {
    match item {
        CborValue::Null => Ok(Value::Null),
        CborValue::Bool(b) => Ok(Value::Bool(b)),
        CborValue::Integer(n) => i64::try_from(i128::from(n))
            .map(Value::Integer)
            .map_err(|_| CodecError::unsupported_type("integer outside i64 range")),
        CborValue::Bytes(b) => Ok(Value::Bytes(b)),
        CborValue::Text(s) => Ok(Value::Text(s)),
        CborValue::Float(_) => Err(CodecError::FloatForbidden),
        CborValue::Tag(tag, _) => Err(CodecError::unsupported_type(format!("tag {tag}"))),
        CborValue::Array(items) => items
            .into_iter()
            .map(from_cbor_value)
            .collect::<CodecResult<Vec<_>>>()
            .map(Value::Array),
        CborValue::Map(pairs) => {
            let pairs = pairs
                .into_iter()
                .map(|(k, v)| Ok((from_cbor_value(k)?, from_cbor_value(v)?)))
                .collect::<CodecResult<Vec<_>>>()?;
            if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
                return Err(CodecError::invalid_structure("duplicate map key"));
            }
            Ok(Value::Map(pairs))
        }
        other => Err(CodecError::unsupported_type(format!("{other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_integers() {
        assert_eq!(from_cbor(&[0x00]).unwrap(), Value::Integer(0));
        assert_eq!(from_cbor(&[0x18, 0x18]).unwrap(), Value::Integer(24));
        assert_eq!(from_cbor(&[0x38, 0x63]).unwrap(), Value::Integer(-100));
    }

    #[test]
    fn decode_simple_values() {
        assert_eq!(from_cbor(&[0xf4]).unwrap(), Value::Bool(false));
        assert_eq!(from_cbor(&[0xf5]).unwrap(), Value::Bool(true));
        assert_eq!(from_cbor(&[0xf6]).unwrap(), Value::Null);
    }

    #[test]
    fn decode_map() {
        let value = from_cbor(&[0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x02]).unwrap();
        assert_eq!(value, Value::object([("a", 1.into()), ("b", 2.into())]));
    }

    #[test]
    fn reject_float() {
        // 1.5 as half-precision float
        let result = from_cbor(&[0xf9, 0x3e, 0x00]);
        assert_eq!(result, Err(CodecError::FloatForbidden));
    }

    #[test]
    fn reject_non_shortest_integer() {
        // 10 encoded with a one-byte argument
        let result = from_cbor(&[0x18, 0x0a]);
        assert_eq!(result, Err(CodecError::NonCanonical));
    }

    #[test]
    fn reject_unsorted_map() {
        let result = from_cbor(&[0xa2, 0x61, 0x62, 0x02, 0x61, 0x61, 0x01]);
        assert_eq!(result, Err(CodecError::NonCanonical));
    }

    #[test]
    fn reject_duplicate_map_keys() {
        let result = from_cbor(&[0xa2, 0x61, 0x61, 0x01, 0x61, 0x61, 0x02]);
        assert!(matches!(result, Err(CodecError::InvalidStructure { .. })));
    }

    #[test]
    fn reject_indefinite_length() {
        // Indefinite-length array [1]
        let result = from_cbor(&[0x9f, 0x01, 0xff]);
        assert_eq!(result, Err(CodecError::NonCanonical));
    }

    #[test]
    fn reject_trailing_bytes() {
        let result = from_cbor(&[0x01, 0x02, 0x03]);
        assert_eq!(result, Err(CodecError::TrailingBytes { count: 2 }));
    }

    #[test]
    fn reject_tag() {
        // Tag 1 (epoch time) wrapping 0
        let result = from_cbor(&[0xc1, 0x00]);
        assert!(matches!(result, Err(CodecError::UnsupportedType { .. })));
    }

    #[test]
    fn reject_truncated() {
        let result = from_cbor(&[0x62, 0x61]);
        assert!(matches!(result, Err(CodecError::DecodingFailed { .. })));
    }
}
