use x509_parser::der_parser::ber::BerObjectContent;
use x509_parser::der_parser::der::parse_der;

use super::utils::{check_certificate_key_matches, leaf_certificate, unexpected_statement};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::certpath::AttestationCertificate;
use crate::data::{AttestationFormat, AttestationStatement, AttestationType};
use crate::errors::VerifyError;
use crate::utils::sha256;

// Apple anonymous attestation nonce extension, also carried by App Attest
pub(super) const OID_APPLE_NONCE: &str = "1.2.840.113635.100.8.2";

/// `apple`: Apple anonymous attestation. The leaf certificate is minted
/// per credential and carries the registration nonce.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppleAnonymousAttestationVerifier;

impl AttestationStatementVerifier for AppleAnonymousAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Apple
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::Apple(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let leaf = leaf_certificate(&statement.x5c, format)?;
        let cert = AttestationCertificate::from_der(leaf)?;
        let nonce = sha256(&object.signed_data());

        let extension = cert.extension_value(OID_APPLE_NONCE).ok_or_else(|| {
            VerifyError::BadAttestationStatement(
                "Apple attestation certificate has no nonce extension".to_string(),
            )
        })?;
        if extract_nonce(extension)? != nonce.as_slice() {
            return Err(VerifyError::BadAttestationStatement(
                "Apple attestation nonce doesn't match".to_string(),
            ));
        }

        check_certificate_key_matches(cert.inner(), object.credential()?.credential_public_key())?;

        Ok(AttestationType::Basic)
    }
}

/// SEQUENCE { [1] EXPLICIT OCTET STRING nonce }
///
/// The wrapper around the nonce may be any constructed element, or left out.
pub(super) fn extract_nonce(extension: &[u8]) -> Result<Vec<u8>, VerifyError> {
    let malformed = || {
        VerifyError::BadAttestationStatement("Malformed Apple nonce extension".to_string())
    };

    let (_, outer) = parse_der(extension).map_err(|_| malformed())?;
    let inner = outer
        .as_sequence()
        .map_err(|_| malformed())?
        .first()
        .ok_or_else(malformed)?;
    let nonce = match &inner.content {
        BerObjectContent::OctetString(bytes) => bytes.to_vec(),
        BerObjectContent::Sequence(items) | BerObjectContent::Set(items) => items
            .first()
            .and_then(|item| item.as_slice().ok())
            .ok_or_else(malformed)?
            .to_vec(),
        BerObjectContent::Unknown(tagged) => {
            let (_, first) = parse_der(tagged.as_bytes()).map_err(|_| malformed())?;
            first.as_slice().map_err(|_| malformed())?.to_vec()
        }
        _ => return Err(malformed()),
    };
    Ok(nonce)
}
