//! Decoders for the binary payloads of a WebAuthn ceremony.

pub mod cbor;
pub mod cose;
pub(crate) mod reader;
pub mod tpm;

pub use cose::{
    CoseAlgorithm, CoseCurve, CoseKey, CoseKeyType, Ec2Key, OkpKey, RsaKey, SymmetricKey,
};
pub use tpm::{TpmAlgHash, TpmEccCurve, TpmsAttest, TpmtPublic, TpmuPublic};
