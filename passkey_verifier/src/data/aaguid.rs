use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::errors::VerifyError;

/// Authenticator model identifier.
///
/// [`Aaguid::NULL`] (all zero) is reported by authenticators that do not
/// disclose their model, and doubles as the wildcard key for trust anchors
/// that apply to every authenticator.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Aaguid([u8; 16]);

impl Aaguid {
    pub const NULL: Aaguid = Aaguid([0u8; 16]);

    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, VerifyError> {
        let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
            VerifyError::DataConversion(format!("AAGUID must be 16 bytes, got {}", bytes.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0 == [0u8; 16]
    }
}

impl fmt::Display for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0).hyphenated())
    }
}

impl fmt::Debug for Aaguid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Aaguid({self})")
    }
}

impl FromStr for Aaguid {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid = Uuid::parse_str(s)
            .map_err(|e| VerifyError::DataConversion(format!("Failed to parse AAGUID: {e}")))?;
        Ok(Self(*uuid.as_bytes()))
    }
}
