use thiserror::Error;

use crate::utils::UtilError;

/// Errors that can occur while verifying WebAuthn ceremonies.
///
/// Every variant carries a human readable message. The variant itself is the
/// machine readable failure kind callers are expected to match on.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// Malformed CBOR, JSON or binary input
    #[error("Data conversion error: {0}")]
    DataConversion(String),

    /// Well-formed input that violates a semantic constraint
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Attestation statement failed structural or cryptographic verification
    #[error("Bad attestation statement: {0}")]
    BadAttestationStatement(String),

    /// Certificate key does not match the attested credential key
    #[error("Public key mismatch: {0}")]
    PublicKeyMismatch(String),

    /// Certificate or certificate path is not acceptable
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// Token binding in client data disagrees with the server observation
    #[error("Token binding error: {0}")]
    TokenBinding(String),

    /// Encountered a tag, format or algorithm that has no handler
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("Invalid challenge: {0}")]
    BadChallenge(String),

    #[error("Invalid origin: {0}")]
    BadOrigin(String),

    #[error("Invalid RP ID hash: {0}")]
    BadRpId(String),

    /// Client data is of the wrong ceremony type or otherwise unusable
    #[error("Invalid client data: {0}")]
    ClientData(String),

    #[error("User presence flag is not set")]
    UserNotPresent,

    #[error("User verification flag is not set")]
    UserNotVerified,

    #[error("Invalid signature: {0}")]
    BadSignature(String),

    /// Credential algorithm is not in the allowed list
    #[error("Algorithm not allowed: {0}")]
    BadAlgorithm(String),

    /// Client extension output that was never requested
    #[error("Unexpected extension: {0}")]
    UnexpectedExtension(String),

    /// Credential id is not one the relying party asked for
    #[error("Credential not allowed: {0}")]
    NotAllowedCredential(String),

    /// Only raised when the caller opts into failing on counter regression
    #[error("Signature counter did not increase: stored {stored}, presented {presented}")]
    CounterRegression { stored: u32, presented: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    /// Trust anchor material could not be read or parsed
    #[error("Trust anchor load error: {0}")]
    TrustAnchorLoad(String),

    #[error("Utils error: {0}")]
    Utils(#[from] UtilError),
}
