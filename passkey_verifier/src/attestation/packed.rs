use super::utils::{attestation_signature_error, statement_alg, unexpected_statement};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::certpath::AttestationCertificate;
use crate::crypto::{verify_with_certificate, verify_with_cose_key};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType, require};
use crate::errors::VerifyError;

const ATTESTATION_OU: &str = "Authenticator Attestation";

/// `packed`: full attestation with an `x5c` chain, or self attestation
/// signed by the credential key itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedAttestationVerifier;

impl AttestationStatementVerifier for PackedAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Packed
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::Packed(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let alg = statement_alg(&statement.alg, format)?;
        let sig = require(&statement.sig, "sig", format)?;
        let credential = object.credential()?;
        let signed_data = object.signed_data();

        if statement.ecdaa_key_id.is_some() {
            return Err(VerifyError::NotImplemented(
                "ECDAA attestation is not supported".to_string(),
            ));
        }

        match &statement.x5c {
            Some(x5c) => {
                tracing::debug!("Full attestation with certificate chain");
                let leaf = x5c.first().ok_or_else(|| {
                    VerifyError::ConstraintViolation("x5c must not be empty".to_string())
                })?;

                verify_with_certificate(leaf, alg, &signed_data, sig)
                    .map_err(attestation_signature_error)?;

                let cert = AttestationCertificate::from_der(leaf)?;
                cert.validate()?;
                if cert.organizational_unit() != Some(ATTESTATION_OU) {
                    return Err(VerifyError::Certificate(format!(
                        "Attestation certificate OU must be '{ATTESTATION_OU}'"
                    )));
                }
                cert.require_not_ca()?;
                cert.check_aaguid(credential.aaguid())?;

                Ok(AttestationType::Basic)
            }
            None => {
                tracing::debug!("Self attestation");
                let key = credential.credential_public_key();
                if key.algorithm() != Some(alg) {
                    return Err(VerifyError::BadAttestationStatement(format!(
                        "Self attestation alg {alg:?} doesn't match credential key algorithm {:?}",
                        key.algorithm()
                    )));
                }
                verify_with_cose_key(key, alg, &signed_data, sig)
                    .map_err(attestation_signature_error)?;

                Ok(AttestationType::SelfAttestation)
            }
        }
    }
}
