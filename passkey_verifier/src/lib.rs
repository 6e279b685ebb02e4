//! passkey-verifier - WebAuthn relying party verification
//!
//! Verifies registration (attestation) and authentication (assertion)
//! ceremonies, plus the App Attest variant used by iOS apps. The crate is
//! stateless: challenges, credential storage and bookkeeping of the
//! signature counter stay with the caller.

pub mod anchor;
pub mod attestation;
pub mod ceremony;
pub mod certpath;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod data;
mod errors;
mod utils;

#[cfg(test)]
mod test_utils;

pub use errors::VerifyError;
pub use utils::{UtilError, base64url_decode, base64url_encode};

pub use anchor::{TrustAnchor, TrustAnchorsResolver};
pub use ceremony::{
    AttestationTrustPolicy, AuthenticationData, AuthenticationParameters, AuthenticationRequest,
    AuthenticationResponse, CounterVerdict, DeviceCheckServerProperty, DeviceCheckVerifier,
    RegistrationData, RegistrationParameters, RegistrationRequest, RegistrationResponse,
    ServerProperty, UserVerificationRequirement, WebAuthnVerifier,
};
pub use codec::{CoseAlgorithm, CoseKey};
pub use config::VerifierConfig;
pub use data::{Aaguid, AttestationType, CredentialRecord};
