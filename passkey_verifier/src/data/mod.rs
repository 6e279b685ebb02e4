//! Data model of the structures exchanged in a ceremony.

mod aaguid;
mod attestation;
mod authenticator_data;
mod client_data;
mod credential;
mod extensions;

pub use aaguid::Aaguid;
pub use attestation::{
    AndroidKeyStatement, AndroidSafetyNetStatement, AppleAppAttestStatement, AppleStatement,
    AttestationFormat, AttestationObject, AttestationStatement, AttestationType, FidoU2fStatement,
    NoneStatement, PackedStatement, TpmStatement,
};
pub(crate) use attestation::require;
pub use authenticator_data::{
    AttestedCredentialData, AuthenticatorData, AuthenticatorFlags, sign_count_of,
};
pub use client_data::{
    ClientDataType, CollectedClientData, TokenBinding, TokenBindingStatus, client_data_json,
};
pub use credential::{AuthenticatorTransport, CredentialRecord};
pub use extensions::{
    AuthenticatorExtensions, ClientExtensionInputs, ClientExtensionOutputs,
    CredentialPropertiesOutput, HmacSecretOutput, UvmEntry,
};
