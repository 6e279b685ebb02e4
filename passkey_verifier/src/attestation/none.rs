use super::utils::unexpected_statement;
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType};
use crate::errors::VerifyError;

/// `none`: the authenticator chose not to attest, typical of platform
/// authenticators.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoneAttestationVerifier;

impl AttestationStatementVerifier for NoneAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::None
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let AttestationStatement::None(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(self.format()));
        };
        if !statement.entries.is_empty() {
            return Err(VerifyError::ConstraintViolation(
                "none attestation statement must be empty".to_string(),
            ));
        }
        Ok(AttestationType::None)
    }
}
