use super::apple::{OID_APPLE_NONCE, extract_nonce};
use super::utils::{check_certificate_key_matches, leaf_certificate, unexpected_statement};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::certpath::AttestationCertificate;
use crate::data::{AttestationFormat, AttestationStatement, AttestationType};
use crate::errors::VerifyError;
use crate::utils::sha256;

/// `apple-appattest`: App Attest key attestation from an iOS app. The
/// credential certificate carries the same nonce extension as `apple`.
///
/// Only the statement itself is checked here. App identity, AAGUID and
/// key id checks belong to [`crate::ceremony::DeviceCheckVerifier`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AppleAppAttestAttestationVerifier;

impl AttestationStatementVerifier for AppleAppAttestAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AppleAppAttest
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::AppleAppAttest(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let leaf = leaf_certificate(&statement.x5c, format)?;
        let cert = AttestationCertificate::from_der(leaf)?;

        let extension = cert.extension_value(OID_APPLE_NONCE).ok_or_else(|| {
            VerifyError::BadAttestationStatement(
                "App Attest credential certificate has no nonce extension".to_string(),
            )
        })?;
        let nonce = sha256(&object.signed_data());
        if extract_nonce(extension)? != nonce.as_slice() {
            return Err(VerifyError::BadAttestationStatement(
                "App Attest nonce doesn't match".to_string(),
            ));
        }

        check_certificate_key_matches(cert.inner(), object.credential()?.credential_public_key())?;

        Ok(AttestationType::Basic)
    }
}
