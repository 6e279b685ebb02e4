use crate::codec::{CoseAlgorithm, CoseKey};
use crate::crypto::public_key_from_certificate;
use crate::data::{AttestationFormat, require};
use crate::errors::VerifyError;
use x509_parser::certificate::X509Certificate;

pub(super) fn unexpected_statement(format: AttestationFormat) -> VerifyError {
    VerifyError::BadAttestationStatement(format!(
        "Attestation statement is not a {format} statement"
    ))
}

pub(super) fn statement_alg(
    alg: &Option<i64>,
    format: AttestationFormat,
) -> Result<CoseAlgorithm, VerifyError> {
    CoseAlgorithm::from_i64(*require(alg, "alg", format)?)
}

/// Leaf of a non-empty `x5c`.
pub(super) fn leaf_certificate(
    x5c: &Option<Vec<Vec<u8>>>,
    format: AttestationFormat,
) -> Result<&[u8], VerifyError> {
    require(x5c, "x5c", format)?
        .first()
        .map(Vec::as_slice)
        .ok_or_else(|| {
            VerifyError::ConstraintViolation(format!(
                "x5c must not be empty in {format} attestation"
            ))
        })
}

/// A failed signature on an attestation statement makes the statement bad;
/// other failures keep their kind.
pub(super) fn attestation_signature_error(error: VerifyError) -> VerifyError {
    match error {
        VerifyError::BadSignature(msg) => {
            VerifyError::BadAttestationStatement(format!("Attestation signature is invalid: {msg}"))
        }
        other => other,
    }
}

pub(super) fn check_certificate_key_matches(
    cert: &X509Certificate<'_>,
    credential_key: &CoseKey,
) -> Result<(), VerifyError> {
    let cert_key = public_key_from_certificate(cert)?;
    if !cert_key.same_public_key(credential_key) {
        return Err(VerifyError::PublicKeyMismatch(
            "Attestation certificate public key doesn't match credential public key".to_string(),
        ));
    }
    Ok(())
}
