use ciborium::value::{Integer, Value as CborValue};

use crate::errors::VerifyError;

/// Decodes exactly one CBOR item. Bytes left over after the item are an error.
pub fn decode(bytes: &[u8]) -> Result<CborValue, VerifyError> {
    let (value, consumed) = decode_prefix(bytes)?;
    if consumed != bytes.len() {
        return Err(VerifyError::DataConversion(format!(
            "CBOR input contains surplus data: {} trailing bytes",
            bytes.len() - consumed
        )));
    }
    Ok(value)
}

/// Decodes the first CBOR item in `bytes` and reports how many bytes it took.
pub fn decode_prefix(bytes: &[u8]) -> Result<(CborValue, usize), VerifyError> {
    let mut reader: &[u8] = bytes;
    let value: CborValue = ciborium::de::from_reader(&mut reader)
        .map_err(|e| VerifyError::DataConversion(format!("Invalid CBOR: {e}")))?;
    Ok((value, bytes.len() - reader.len()))
}

pub fn encode(value: &CborValue) -> Result<Vec<u8>, VerifyError> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out)
        .map_err(|e| VerifyError::DataConversion(format!("Failed to encode CBOR: {e}")))?;
    Ok(out)
}

pub(crate) fn into_map(
    value: CborValue,
    what: &str,
) -> Result<Vec<(CborValue, CborValue)>, VerifyError> {
    match value {
        CborValue::Map(entries) => Ok(entries),
        _ => Err(VerifyError::DataConversion(format!("{what} is not a CBOR map"))),
    }
}

pub(crate) fn get_text_key<'a>(
    map: &'a [(CborValue, CborValue)],
    key: &str,
) -> Option<&'a CborValue> {
    map.iter().find_map(|(k, v)| match k {
        CborValue::Text(k) if k == key => Some(v),
        _ => None,
    })
}

pub(crate) fn integer_to_i64(integer: &Integer) -> Result<i64, VerifyError> {
    i64::try_from(*integer)
        .map_err(|_| VerifyError::DataConversion("CBOR integer out of i64 range".to_string()))
}

pub(crate) fn as_i64(value: &CborValue, what: &str) -> Result<i64, VerifyError> {
    match value {
        CborValue::Integer(i) => integer_to_i64(i),
        _ => Err(VerifyError::DataConversion(format!("{what} must be a CBOR integer"))),
    }
}

pub(crate) fn as_bytes<'a>(value: &'a CborValue, what: &str) -> Result<&'a [u8], VerifyError> {
    match value {
        CborValue::Bytes(b) => Ok(b),
        _ => Err(VerifyError::DataConversion(format!("{what} must be a CBOR byte string"))),
    }
}

pub(crate) fn as_text<'a>(value: &'a CborValue, what: &str) -> Result<&'a str, VerifyError> {
    match value {
        CborValue::Text(t) => Ok(t),
        _ => Err(VerifyError::DataConversion(format!("{what} must be a CBOR text string"))),
    }
}

/// Reads an `x5c`-style array of DER certificates.
pub(crate) fn as_bytes_array(value: &CborValue, what: &str) -> Result<Vec<Vec<u8>>, VerifyError> {
    match value {
        CborValue::Array(items) => items
            .iter()
            .map(|item| as_bytes(item, what).map(<[u8]>::to_vec))
            .collect(),
        _ => Err(VerifyError::DataConversion(format!("{what} must be a CBOR array"))),
    }
}
