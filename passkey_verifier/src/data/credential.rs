use serde::{Deserialize, Serialize};

use crate::errors::VerifyError;

use super::attestation::AttestationType;
use super::authenticator_data::AttestedCredentialData;
use super::extensions::AuthenticatorExtensions;

const MAX_SIGN_COUNT: i64 = u32::MAX as i64;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AuthenticatorTransport {
    Usb,
    Nfc,
    Ble,
    SmartCard,
    Hybrid,
    Internal,
    Other(String),
}

impl From<String> for AuthenticatorTransport {
    fn from(value: String) -> Self {
        match value.as_str() {
            "usb" => Self::Usb,
            "nfc" => Self::Nfc,
            "ble" => Self::Ble,
            "smart-card" => Self::SmartCard,
            "hybrid" => Self::Hybrid,
            "internal" => Self::Internal,
            _ => Self::Other(value),
        }
    }
}

impl From<AuthenticatorTransport> for String {
    fn from(value: AuthenticatorTransport) -> Self {
        match value {
            AuthenticatorTransport::Usb => "usb".to_string(),
            AuthenticatorTransport::Nfc => "nfc".to_string(),
            AuthenticatorTransport::Ble => "ble".to_string(),
            AuthenticatorTransport::SmartCard => "smart-card".to_string(),
            AuthenticatorTransport::Hybrid => "hybrid".to_string(),
            AuthenticatorTransport::Internal => "internal".to_string(),
            AuthenticatorTransport::Other(s) => s,
        }
    }
}

/// Long lived credential state owned by the caller.
///
/// Created from a verified registration and updated by the caller after
/// each authentication. Verification only reads it.
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialRecord {
    attested_credential_data: AttestedCredentialData,
    sign_count: u32,
    transports: Vec<AuthenticatorTransport>,
    attestation_type: Option<AttestationType>,
    authenticator_extensions: Option<AuthenticatorExtensions>,
    backup_eligible: bool,
    backup_state: bool,
}

impl CredentialRecord {
    /// `sign_count` is taken as a wide integer so values read back from
    /// storage can be range checked here.
    pub fn new(
        attested_credential_data: AttestedCredentialData,
        sign_count: i64,
    ) -> Result<Self, VerifyError> {
        Ok(Self {
            attested_credential_data,
            sign_count: check_sign_count(sign_count)?,
            transports: Vec::new(),
            attestation_type: None,
            authenticator_extensions: None,
            backup_eligible: false,
            backup_state: false,
        })
    }

    pub fn with_transports(mut self, transports: Vec<AuthenticatorTransport>) -> Self {
        self.transports = transports;
        self
    }

    pub fn with_attestation_type(mut self, attestation_type: AttestationType) -> Self {
        self.attestation_type = Some(attestation_type);
        self
    }

    pub fn with_authenticator_extensions(mut self, extensions: AuthenticatorExtensions) -> Self {
        self.authenticator_extensions = Some(extensions);
        self
    }

    pub fn with_backup_flags(mut self, eligible: bool, state: bool) -> Self {
        self.backup_eligible = eligible;
        self.backup_state = state;
        self
    }

    pub fn set_sign_count(&mut self, sign_count: i64) -> Result<(), VerifyError> {
        self.sign_count = check_sign_count(sign_count)?;
        Ok(())
    }

    pub fn attested_credential_data(&self) -> &AttestedCredentialData {
        &self.attested_credential_data
    }

    pub fn credential_id(&self) -> &[u8] {
        self.attested_credential_data.credential_id()
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn transports(&self) -> &[AuthenticatorTransport] {
        &self.transports
    }

    pub fn attestation_type(&self) -> Option<AttestationType> {
        self.attestation_type
    }

    pub fn authenticator_extensions(&self) -> Option<&AuthenticatorExtensions> {
        self.authenticator_extensions.as_ref()
    }

    pub fn backup_eligible(&self) -> bool {
        self.backup_eligible
    }

    pub fn backup_state(&self) -> bool {
        self.backup_state
    }
}

fn check_sign_count(value: i64) -> Result<u32, VerifyError> {
    if value < 0 {
        return Err(VerifyError::ConstraintViolation(format!(
            "Invalid sign count {value}: it must not be negative value."
        )));
    }
    if value > MAX_SIGN_COUNT {
        return Err(VerifyError::ConstraintViolation(format!(
            "Invalid sign count {value}: it must not exceed {MAX_SIGN_COUNT}."
        )));
    }
    Ok(value as u32)
}
