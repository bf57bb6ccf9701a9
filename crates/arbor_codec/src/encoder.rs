//! Canonical CBOR encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use ciborium::value::Value as CborValue;

/// Encode a value to canonical CBOR bytes.
///
/// Output is deterministic: map keys are written in canonical order,
/// integers use the shortest encoding, and lengths are always definite.
///
/// # Errors
///
/// Returns an error if the underlying writer fails.
pub fn to_canonical_cbor(value: &Value) -> CodecResult<Vec<u8>> {
    let mut buffer = Vec::new();
    ciborium::into_writer(&to_cbor_value(value), &mut buffer)
        .map_err(|e| CodecError::encoding_failed(e.to_string()))?;
    Ok(buffer)
}

fn to_cbor_value(value: &Value) -> CborValue {
    match value {
        Value::Null => CborValue::Null,
        Value::Bool(b) => CborValue::Bool(*b),
        Value::Integer(n) => CborValue::Integer((*n).into()),
        Value::Bytes(b) => CborValue::Bytes(b.clone()),
        Value::Text(s) => CborValue::Text(s.clone()),
        Value::Array(items) => CborValue::Array(items.iter().map(to_cbor_value).collect()),
        Value::Map(pairs) => {
            let mut sorted: Vec<&(Value, Value)> = pairs.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp_canonical(&b.0));
            CborValue::Map(
                sorted
                    .into_iter()
                    .map(|(k, v)| (to_cbor_value(k), to_cbor_value(v)))
                    .collect(),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_null() {
        assert_eq!(to_canonical_cbor(&Value::Null).unwrap(), vec![0xf6]);
    }

    #[test]
    fn encode_bools() {
        assert_eq!(to_canonical_cbor(&Value::Bool(false)).unwrap(), vec![0xf4]);
        assert_eq!(to_canonical_cbor(&Value::Bool(true)).unwrap(), vec![0xf5]);
    }

    #[test]
    fn encode_integers_shortest_form() {
        assert_eq!(to_canonical_cbor(&Value::Integer(0)).unwrap(), vec![0x00]);
        assert_eq!(to_canonical_cbor(&Value::Integer(23)).unwrap(), vec![0x17]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(24)).unwrap(),
            vec![0x18, 0x18]
        );
        assert_eq!(
            to_canonical_cbor(&Value::Integer(1000)).unwrap(),
            vec![0x19, 0x03, 0xe8]
        );
        assert_eq!(to_canonical_cbor(&Value::Integer(-1)).unwrap(), vec![0x20]);
        assert_eq!(
            to_canonical_cbor(&Value::Integer(-100)).unwrap(),
            vec![0x38, 0x63]
        );
    }

    #[test]
    fn encode_text() {
        assert_eq!(
            to_canonical_cbor(&Value::from("IETF")).unwrap(),
            vec![0x64, 0x49, 0x45, 0x54, 0x46]
        );
    }

    #[test]
    fn encode_unsorted_map_canonically() {
        let unsorted = Value::Map(vec![
            (Value::from("b"), Value::Integer(2)),
            (Value::from("a"), Value::Integer(1)),
        ]);
        let sorted = Value::object([("a", 1.into()), ("b", 2.into())]);

        let bytes = to_canonical_cbor(&unsorted).unwrap();
        assert_eq!(bytes, to_canonical_cbor(&sorted).unwrap());
        assert_eq!(bytes, vec![0xa2, 0x61, 0x61, 0x01, 0x61, 0x62, 0x02]);
    }

    #[test]
    fn deterministic_output() {
        let value = Value::object([
            ("name", "Alice".into()),
            ("tags", Value::Array(vec!["x".into(), "y".into()])),
        ]);
        assert_eq!(
            to_canonical_cbor(&value).unwrap(),
            to_canonical_cbor(&value.clone()).unwrap()
        );
    }
}
