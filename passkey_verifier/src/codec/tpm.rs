//! TPM 2.0 structures carried in a `tpm` attestation statement
//! (TPM Library Part 2: TPMT_PUBLIC and TPMS_ATTEST).

use super::reader::{ByteReader, write_sized};
use crate::errors::VerifyError;

pub const TPM_GENERATED_VALUE: u32 = 0xff54_4347; // 0xFF + "TCG"
pub const TPM_ST_ATTEST_CERTIFY: u16 = 0x8017;

const TPM_ALG_RSA: u16 = 0x0001;
const TPM_ALG_ECC: u16 = 0x0023;

/// Hash algorithm ids that can appear as `nameAlg`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmAlgHash {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl TpmAlgHash {
    pub fn from_u16(value: u16) -> Result<Self, VerifyError> {
        match value {
            0x0004 => Ok(Self::Sha1),
            0x000b => Ok(Self::Sha256),
            0x000c => Ok(Self::Sha384),
            0x000d => Ok(Self::Sha512),
            other => Err(VerifyError::NotImplemented(format!(
                "TPM hash algorithm 0x{other:04x} is not supported"
            ))),
        }
    }

    pub fn value(self) -> u16 {
        match self {
            Self::Sha1 => 0x0004,
            Self::Sha256 => 0x000b,
            Self::Sha384 => 0x000c,
            Self::Sha512 => 0x000d,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        use sha2::Digest;
        match self {
            Self::Sha1 => ring::digest::digest(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY, data)
                .as_ref()
                .to_vec(),
            Self::Sha256 => sha2::Sha256::digest(data).to_vec(),
            Self::Sha384 => sha2::Sha384::digest(data).to_vec(),
            Self::Sha512 => sha2::Sha512::digest(data).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TpmEccCurve {
    NistP256,
    NistP384,
    NistP521,
}

impl TpmEccCurve {
    pub fn from_u16(value: u16) -> Result<Self, VerifyError> {
        match value {
            0x0003 => Ok(Self::NistP256),
            0x0004 => Ok(Self::NistP384),
            0x0005 => Ok(Self::NistP521),
            other => Err(VerifyError::NotImplemented(format!(
                "TPM ECC curve 0x{other:04x} is not supported"
            ))),
        }
    }

    pub fn value(self) -> u16 {
        match self {
            Self::NistP256 => 0x0003,
            Self::NistP384 => 0x0004,
            Self::NistP521 => 0x0005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsRsaParms {
    pub symmetric: u16,
    pub scheme: u16,
    pub key_bits: u16,
    /// Zero means the default exponent 65537.
    pub exponent: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsEccParms {
    pub symmetric: u16,
    pub scheme: u16,
    pub curve_id: TpmEccCurve,
    pub kdf: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TpmuPublic {
    Rsa { parameters: TpmsRsaParms, n: Vec<u8> },
    Ecc { parameters: TpmsEccParms, x: Vec<u8>, y: Vec<u8> },
}

/// TPMT_PUBLIC, the `pubArea` of a TPM attestation statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmtPublic {
    pub name_alg: u16,
    pub object_attributes: u32,
    pub auth_policy: Vec<u8>,
    pub key: TpmuPublic,
}

impl TpmtPublic {
    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        let mut reader = ByteReader::new(bytes, "TPMT_PUBLIC");
        let alg_type = reader.read_u16()?;
        let name_alg = reader.read_u16()?;
        let object_attributes = reader.read_u32()?;
        let auth_policy = reader.read_sized()?.to_vec();

        let key = match alg_type {
            TPM_ALG_RSA => {
                let parameters = TpmsRsaParms {
                    symmetric: reader.read_u16()?,
                    scheme: reader.read_u16()?,
                    key_bits: reader.read_u16()?,
                    exponent: reader.read_u32()?,
                };
                let n = reader.read_sized()?.to_vec();
                TpmuPublic::Rsa { parameters, n }
            }
            TPM_ALG_ECC => {
                let parameters = TpmsEccParms {
                    symmetric: reader.read_u16()?,
                    scheme: reader.read_u16()?,
                    curve_id: TpmEccCurve::from_u16(reader.read_u16()?)?,
                    kdf: reader.read_u16()?,
                };
                let x = reader.read_sized()?.to_vec();
                let y = reader.read_sized()?.to_vec();
                TpmuPublic::Ecc { parameters, x, y }
            }
            other => {
                return Err(VerifyError::NotImplemented(format!(
                    "TPM public key type 0x{other:04x} is not supported"
                )));
            }
        };

        reader.finish()?;
        Ok(Self {
            name_alg,
            object_attributes,
            auth_policy,
            key,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, VerifyError> {
        let mut out = Vec::new();
        let alg_type = match self.key {
            TpmuPublic::Rsa { .. } => TPM_ALG_RSA,
            TpmuPublic::Ecc { .. } => TPM_ALG_ECC,
        };
        out.extend_from_slice(&alg_type.to_be_bytes());
        out.extend_from_slice(&self.name_alg.to_be_bytes());
        out.extend_from_slice(&self.object_attributes.to_be_bytes());
        write_sized(&mut out, &self.auth_policy)?;
        match &self.key {
            TpmuPublic::Rsa { parameters, n } => {
                out.extend_from_slice(&parameters.symmetric.to_be_bytes());
                out.extend_from_slice(&parameters.scheme.to_be_bytes());
                out.extend_from_slice(&parameters.key_bits.to_be_bytes());
                out.extend_from_slice(&parameters.exponent.to_be_bytes());
                write_sized(&mut out, n)?;
            }
            TpmuPublic::Ecc { parameters, x, y } => {
                out.extend_from_slice(&parameters.symmetric.to_be_bytes());
                out.extend_from_slice(&parameters.scheme.to_be_bytes());
                out.extend_from_slice(&parameters.curve_id.value().to_be_bytes());
                out.extend_from_slice(&parameters.kdf.to_be_bytes());
                write_sized(&mut out, x)?;
                write_sized(&mut out, y)?;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsClockInfo {
    pub clock: u64,
    pub reset_count: u32,
    pub restart_count: u32,
    pub safe: u8,
}

/// TPMS_ATTEST, the `certInfo` of a TPM attestation statement. Only the
/// certify variant is meaningful for WebAuthn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmsAttest {
    pub magic: u32,
    pub attest_type: u16,
    pub qualified_signer: Vec<u8>,
    pub extra_data: Vec<u8>,
    pub clock_info: TpmsClockInfo,
    pub firmware_version: u64,
    /// TPM2B_NAME of the certified object: `nameAlg || H(pubArea)`.
    pub attested_name: Vec<u8>,
    pub attested_qualified_name: Vec<u8>,
}

impl TpmsAttest {
    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        let mut reader = ByteReader::new(bytes, "TPMS_ATTEST");
        let magic = reader.read_u32()?;
        let attest_type = reader.read_u16()?;
        let qualified_signer = reader.read_sized()?.to_vec();
        let extra_data = reader.read_sized()?.to_vec();
        let clock_info = TpmsClockInfo {
            clock: reader.read_u64()?,
            reset_count: reader.read_u32()?,
            restart_count: reader.read_u32()?,
            safe: reader.read_u8()?,
        };
        let firmware_version = reader.read_u64()?;

        if attest_type != TPM_ST_ATTEST_CERTIFY {
            return Err(VerifyError::NotImplemented(format!(
                "TPM attest type 0x{attest_type:04x} is not supported"
            )));
        }
        let attested_name = reader.read_sized()?.to_vec();
        let attested_qualified_name = reader.read_sized()?.to_vec();
        reader.finish()?;

        Ok(Self {
            magic,
            attest_type,
            qualified_signer,
            extra_data,
            clock_info,
            firmware_version,
            attested_name,
            attested_qualified_name,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, VerifyError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.magic.to_be_bytes());
        out.extend_from_slice(&self.attest_type.to_be_bytes());
        write_sized(&mut out, &self.qualified_signer)?;
        write_sized(&mut out, &self.extra_data)?;
        out.extend_from_slice(&self.clock_info.clock.to_be_bytes());
        out.extend_from_slice(&self.clock_info.reset_count.to_be_bytes());
        out.extend_from_slice(&self.clock_info.restart_count.to_be_bytes());
        out.push(self.clock_info.safe);
        out.extend_from_slice(&self.firmware_version.to_be_bytes());
        write_sized(&mut out, &self.attested_name)?;
        write_sized(&mut out, &self.attested_qualified_name)?;
        Ok(out)
    }
}
