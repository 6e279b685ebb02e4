//! Attestation statement verification, one verifier per `fmt`.

mod android_key;
mod android_safetynet;
mod apple;
mod apple_appattest;
mod none;
mod packed;
mod tpm;
mod u2f;
mod utils;

use crate::data::{AttestationFormat, AttestationObject, AttestationType, AttestedCredentialData};
use crate::errors::VerifyError;

pub use android_key::AndroidKeyAttestationVerifier;
pub use android_safetynet::AndroidSafetyNetAttestationVerifier;
pub use apple::AppleAnonymousAttestationVerifier;
pub use apple_appattest::AppleAppAttestAttestationVerifier;
pub use none::NoneAttestationVerifier;
pub use packed::PackedAttestationVerifier;
pub use tpm::TpmAttestationVerifier;
pub use u2f::FidoU2fAttestationVerifier;

/// Inputs shared by every attestation statement verifier.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationObject<'a> {
    pub attestation_object: &'a AttestationObject,
    pub client_data_hash: &'a [u8; 32],
}

impl<'a> RegistrationObject<'a> {
    pub fn new(attestation_object: &'a AttestationObject, client_data_hash: &'a [u8; 32]) -> Self {
        Self {
            attestation_object,
            client_data_hash,
        }
    }

    /// `authData || clientDataHash`, the message most formats sign.
    pub fn signed_data(&self) -> Vec<u8> {
        crate::utils::concat_signed_data(
            self.attestation_object.authenticator_data_bytes(),
            self.client_data_hash,
        )
    }

    pub fn credential(&self) -> Result<&'a AttestedCredentialData, VerifyError> {
        self.attestation_object
            .authenticator_data()
            .attested_credential_data()
            .ok_or_else(|| {
                VerifyError::ConstraintViolation(
                    "Attested credential data is required for registration".to_string(),
                )
            })
    }
}

pub trait AttestationStatementVerifier: Send + Sync {
    fn format(&self) -> AttestationFormat;

    fn supports(&self, object: &RegistrationObject<'_>) -> bool {
        object.attestation_object.format() == self.format()
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError>;

    /// Certificate path the trustworthiness check should validate, leaf
    /// first. Defaults to the statement's `x5c`.
    fn trust_path(
        &self,
        object: &RegistrationObject<'_>,
    ) -> Result<Option<Vec<Vec<u8>>>, VerifyError> {
        Ok(object
            .attestation_object
            .attestation_statement()
            .x5c()
            .map(<[Vec<u8>]>::to_vec))
    }
}

/// Result of verifying one attestation statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttestationOutcome {
    pub attestation_type: AttestationType,
    pub trust_path: Option<Vec<Vec<u8>>>,
}

/// Registry of statement verifiers consulted in registration order.
pub struct AttestationVerifiers {
    verifiers: Vec<Box<dyn AttestationStatementVerifier>>,
}

impl Default for AttestationVerifiers {
    fn default() -> Self {
        Self::new(AndroidSafetyNetAttestationVerifier::default())
    }
}

impl AttestationVerifiers {
    /// Every built-in format. SafetyNet needs its timestamp window.
    pub fn new(safetynet: AndroidSafetyNetAttestationVerifier) -> Self {
        Self {
            verifiers: vec![
                Box::new(NoneAttestationVerifier),
                Box::new(PackedAttestationVerifier),
                Box::new(TpmAttestationVerifier),
                Box::new(AndroidKeyAttestationVerifier),
                Box::new(safetynet),
                Box::new(AppleAnonymousAttestationVerifier),
                Box::new(FidoU2fAttestationVerifier),
            ],
        }
    }

    /// App Attest registrations only carry `apple-appattest` statements.
    pub fn app_attest() -> Self {
        Self::empty().with_verifier(Box::new(AppleAppAttestAttestationVerifier))
    }

    pub fn empty() -> Self {
        Self { verifiers: vec![] }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn AttestationStatementVerifier>) -> Self {
        self.verifiers.push(verifier);
        self
    }

    pub fn verify(
        &self,
        object: &RegistrationObject<'_>,
    ) -> Result<AttestationOutcome, VerifyError> {
        let format = object.attestation_object.format();
        let verifier = self
            .verifiers
            .iter()
            .find(|v| v.supports(object))
            .ok_or_else(|| {
                VerifyError::NotImplemented(format!(
                    "No verifier registered for '{format}' attestation"
                ))
            })?;

        tracing::debug!("Using '{}' attestation format", format);
        object.attestation_object.attestation_statement().validate()?;
        let attestation_type = verifier.verify(object)?;
        let trust_path = verifier.trust_path(object)?;
        tracing::debug!("Attestation type: {:?}", attestation_type);

        Ok(AttestationOutcome {
            attestation_type,
            trust_path,
        })
    }
}
