//! `authenticatorData` (WebAuthn §6.1).
//!
//! ```text
//! rpIdHash(32) | flags(1) | signCount(4, BE)
//!   [ aaguid(16) | credIdLen(2, BE) | credId | COSE_Key ]   when AT is set
//!   [ extensions CBOR map ]                                 when ED is set
//! ```

use std::fmt;

use crate::codec::{CoseKey, cbor, reader::ByteReader};
use crate::errors::VerifyError;

use super::aaguid::Aaguid;
use super::extensions::AuthenticatorExtensions;

const MIN_AUTH_DATA_LEN: usize = 37;
const MAX_CREDENTIAL_ID_LEN: usize = 1023;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AuthenticatorFlags(u8);

impl AuthenticatorFlags {
    pub const USER_PRESENT: u8 = 1 << 0;
    pub const USER_VERIFIED: u8 = 1 << 2;
    pub const BACKUP_ELIGIBLE: u8 = 1 << 3;
    pub const BACKUP_STATE: u8 = 1 << 4;
    pub const ATTESTED_CREDENTIAL_DATA: u8 = 1 << 6;
    pub const EXTENSION_DATA: u8 = 1 << 7;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn contains(self, flag: u8) -> bool {
        self.0 & flag == flag
    }

    pub const fn is_user_present(self) -> bool {
        self.contains(Self::USER_PRESENT)
    }

    pub const fn is_user_verified(self) -> bool {
        self.contains(Self::USER_VERIFIED)
    }

    pub const fn is_backup_eligible(self) -> bool {
        self.contains(Self::BACKUP_ELIGIBLE)
    }

    pub const fn is_backed_up(self) -> bool {
        self.contains(Self::BACKUP_STATE)
    }

    pub const fn has_attested_credential_data(self) -> bool {
        self.contains(Self::ATTESTED_CREDENTIAL_DATA)
    }

    pub const fn has_extension_data(self) -> bool {
        self.contains(Self::EXTENSION_DATA)
    }
}

impl fmt::Debug for AuthenticatorFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::USER_PRESENT, "UP"),
            (Self::USER_VERIFIED, "UV"),
            (Self::BACKUP_ELIGIBLE, "BE"),
            (Self::BACKUP_STATE, "BS"),
            (Self::ATTESTED_CREDENTIAL_DATA, "AT"),
            (Self::EXTENSION_DATA, "ED"),
        ];
        let set: Vec<&str> = names
            .iter()
            .filter(|(bit, _)| self.contains(*bit))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "AuthenticatorFlags(0x{:02x} {})", self.0, set.join("|"))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttestedCredentialData {
    aaguid: Aaguid,
    credential_id: Vec<u8>,
    credential_public_key: CoseKey,
}

impl AttestedCredentialData {
    pub fn new(
        aaguid: Aaguid,
        credential_id: Vec<u8>,
        credential_public_key: CoseKey,
    ) -> Result<Self, VerifyError> {
        if credential_id.is_empty() || credential_id.len() > MAX_CREDENTIAL_ID_LEN {
            return Err(VerifyError::ConstraintViolation(format!(
                "Credential ID length must be between 1 and {MAX_CREDENTIAL_ID_LEN}, got {}",
                credential_id.len()
            )));
        }
        Ok(Self {
            aaguid,
            credential_id,
            credential_public_key,
        })
    }

    pub fn aaguid(&self) -> Aaguid {
        self.aaguid
    }

    pub fn credential_id(&self) -> &[u8] {
        &self.credential_id
    }

    pub fn credential_public_key(&self) -> &CoseKey {
        &self.credential_public_key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatorData {
    rp_id_hash: [u8; 32],
    flags: AuthenticatorFlags,
    sign_count: u32,
    attested_credential_data: Option<AttestedCredentialData>,
    extensions: Option<AuthenticatorExtensions>,
}

impl AuthenticatorData {
    /// Builds authenticator data, checking that the AT and ED flags agree
    /// with the optional sections.
    pub fn new(
        rp_id_hash: [u8; 32],
        flags: AuthenticatorFlags,
        sign_count: u32,
        attested_credential_data: Option<AttestedCredentialData>,
        extensions: Option<AuthenticatorExtensions>,
    ) -> Result<Self, VerifyError> {
        if flags.has_attested_credential_data() != attested_credential_data.is_some() {
            return Err(VerifyError::ConstraintViolation(
                "AT flag and attested credential data disagree".to_string(),
            ));
        }
        if flags.has_extension_data() != extensions.is_some() {
            return Err(VerifyError::ConstraintViolation(
                "ED flag and extension data disagree".to_string(),
            ));
        }
        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, VerifyError> {
        if bytes.len() < MIN_AUTH_DATA_LEN {
            return Err(VerifyError::DataConversion(format!(
                "Authenticator data must be at least {MIN_AUTH_DATA_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let mut reader = ByteReader::new(bytes, "Authenticator data");
        let rp_id_hash = reader.read_array::<32>()?;
        let flags = AuthenticatorFlags::from_bits(reader.read_u8()?);
        let sign_count = reader.read_u32()?;

        let attested_credential_data = if flags.has_attested_credential_data() {
            let aaguid = Aaguid::new(reader.read_array::<16>()?);
            let id_len = reader.read_u16()? as usize;
            if id_len > MAX_CREDENTIAL_ID_LEN {
                return Err(VerifyError::DataConversion(format!(
                    "Credential ID length {id_len} exceeds {MAX_CREDENTIAL_ID_LEN}"
                )));
            }
            let credential_id = reader.read_bytes(id_len)?.to_vec();
            let (key, consumed) = CoseKey::decode_prefix(reader.remaining())?;
            reader.advance(consumed)?;
            tracing::debug!(
                "Attested credential data: aaguid={}, credential id {} bytes, key {} bytes",
                aaguid,
                id_len,
                consumed
            );
            Some(AttestedCredentialData::new(aaguid, credential_id, key).map_err(|e| {
                VerifyError::DataConversion(format!("Invalid attested credential data: {e}"))
            })?)
        } else {
            None
        };

        let extensions = if flags.has_extension_data() {
            let (value, consumed) = cbor::decode_prefix(reader.remaining())?;
            reader.advance(consumed)?;
            Some(AuthenticatorExtensions::from_cbor(value)?)
        } else {
            None
        };

        reader.finish()?;

        Ok(Self {
            rp_id_hash,
            flags,
            sign_count,
            attested_credential_data,
            extensions,
        })
    }

    pub fn serialize(&self) -> Result<Vec<u8>, VerifyError> {
        let mut out = Vec::with_capacity(MIN_AUTH_DATA_LEN);
        out.extend_from_slice(&self.rp_id_hash);
        out.push(self.flags.bits());
        out.extend_from_slice(&self.sign_count.to_be_bytes());

        if let Some(acd) = &self.attested_credential_data {
            out.extend_from_slice(acd.aaguid.as_bytes());
            // Length is bounded by MAX_CREDENTIAL_ID_LEN at construction.
            out.extend_from_slice(&(acd.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&acd.credential_id);
            out.extend_from_slice(&acd.credential_public_key.encode()?);
        }
        if let Some(extensions) = &self.extensions {
            out.extend_from_slice(&cbor::encode(&extensions.to_cbor())?);
        }
        Ok(out)
    }

    pub fn rp_id_hash(&self) -> &[u8; 32] {
        &self.rp_id_hash
    }

    pub fn flags(&self) -> AuthenticatorFlags {
        self.flags
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn attested_credential_data(&self) -> Option<&AttestedCredentialData> {
        self.attested_credential_data.as_ref()
    }

    pub fn extensions(&self) -> Option<&AuthenticatorExtensions> {
        self.extensions.as_ref()
    }

    /// Identifiers present in the extensions section; empty when ED is unset.
    pub fn extension_identifiers(&self) -> Vec<&str> {
        self.extensions
            .as_ref()
            .map(AuthenticatorExtensions::identifiers)
            .unwrap_or_default()
    }
}

/// Reads the signature counter from raw authenticator data without parsing
/// the rest of it.
pub fn sign_count_of(bytes: &[u8]) -> Result<u32, VerifyError> {
    let counter: [u8; 4] = bytes
        .get(33..37)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| {
            VerifyError::DataConversion(format!(
                "Authenticator data is too short to carry a sign count: {} bytes",
                bytes.len()
            ))
        })?;
    Ok(u32::from_be_bytes(counter))
}
