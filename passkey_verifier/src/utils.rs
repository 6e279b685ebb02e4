use base64::{
    Engine as _,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use ring::digest;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UtilError {
    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Invalid format: {0}")]
    Format(String),
}

pub fn base64url_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    // Browsers occasionally send padded base64url, strip it before decoding.
    let decoded = URL_SAFE_NO_PAD
        .decode(input.trim_end_matches('='))
        .map_err(|_| UtilError::Format("Failed to decode base64url".to_string()))?;
    Ok(decoded)
}

pub fn base64url_encode(input: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(input)
}

pub(crate) fn base64_decode(input: &str) -> Result<Vec<u8>, UtilError> {
    STANDARD
        .decode(input)
        .map_err(|_| UtilError::Format("Failed to decode base64".to_string()))
}

pub(crate) fn base64_encode(input: &[u8]) -> String {
    STANDARD.encode(input)
}

pub(crate) fn sha256(input: &[u8]) -> [u8; 32] {
    let hash = digest::digest(&digest::SHA256, input);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_ref());
    out
}

/// `authenticatorData || clientDataHash`, the payload most attestation
/// formats sign over.
pub(crate) fn concat_signed_data(auth_data: &[u8], client_data_hash: &[u8]) -> Vec<u8> {
    let mut signed_data = Vec::with_capacity(auth_data.len() + client_data_hash.len());
    signed_data.extend_from_slice(auth_data);
    signed_data.extend_from_slice(client_data_hash);
    signed_data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64url_roundtrip() {
        let data = vec![0xfb, 0xff, 0x00, 0x10];
        let encoded = base64url_encode(&data);
        assert_eq!(encoded, "-_8AEA");
        assert_eq!(base64url_decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64url_decode_accepts_padding() {
        assert_eq!(base64url_decode("AQI=").unwrap(), vec![0x01, 0x02]);
    }

    #[test]
    fn test_base64url_decode_invalid() {
        let result = base64url_decode("not base64!");
        assert!(matches!(result, Err(UtilError::Format(_))));
    }

    #[test]
    fn test_sha256_known_value() {
        let hash = sha256(b"abc");
        assert_eq!(hash[0], 0xba);
        assert_eq!(hash[31], 0xad);
    }
}
