use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::codec::CoseAlgorithm;
use crate::data::{
    AttestationObject, AttestationType, AuthenticatorData, AuthenticatorTransport,
    ClientExtensionInputs, ClientExtensionOutputs, CollectedClientData, CredentialRecord,
};
use crate::errors::VerifyError;
use crate::utils::base64url_decode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVerificationRequirement {
    Required,
    #[default]
    Preferred,
    Discouraged,
}

impl UserVerificationRequirement {
    pub fn is_required(self) -> bool {
        self == Self::Required
    }
}

impl FromStr for UserVerificationRequirement {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "preferred" => Ok(Self::Preferred),
            "discouraged" => Ok(Self::Discouraged),
            other => Err(VerifyError::Config(format!(
                "Invalid user verification requirement: {other}"
            ))),
        }
    }
}

/// What the relying party knows about the ceremony it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProperty {
    /// Origins accepted in client data, compared exactly.
    pub origins: Vec<String>,
    pub rp_id: String,
    pub challenge: Vec<u8>,
    /// Token binding id observed on the TLS connection, if any.
    pub token_binding_id: Option<Vec<u8>>,
}

impl ServerProperty {
    pub fn new(origin: impl Into<String>, rp_id: impl Into<String>, challenge: Vec<u8>) -> Self {
        Self {
            origins: vec![origin.into()],
            rp_id: rp_id.into(),
            challenge,
            token_binding_id: None,
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origins.push(origin.into());
        self
    }

    pub fn with_token_binding_id(mut self, id: Vec<u8>) -> Self {
        self.token_binding_id = Some(id);
        self
    }
}

/// Algorithms accepted when no list is given: the ones `pubKeyCredParams`
/// commonly advertises.
pub fn default_allowed_algorithms() -> Vec<CoseAlgorithm> {
    vec![
        CoseAlgorithm::ES256,
        CoseAlgorithm::ES384,
        CoseAlgorithm::EdDSA,
        CoseAlgorithm::RS256,
        CoseAlgorithm::PS256,
    ]
}

#[derive(Debug, Clone)]
pub struct RegistrationParameters {
    pub server_property: ServerProperty,
    pub user_verification: UserVerificationRequirement,
    pub user_presence_required: bool,
    pub allowed_algorithms: Vec<CoseAlgorithm>,
    pub extension_inputs: ClientExtensionInputs,
}

impl RegistrationParameters {
    pub fn new(server_property: ServerProperty) -> Self {
        Self {
            server_property,
            user_verification: UserVerificationRequirement::default(),
            user_presence_required: true,
            allowed_algorithms: default_allowed_algorithms(),
            extension_inputs: ClientExtensionInputs::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthenticationParameters {
    pub server_property: ServerProperty,
    /// Credential ids the relying party offered. Empty for discoverable
    /// credential flows.
    pub allow_credentials: Vec<Vec<u8>>,
    pub user_verification: UserVerificationRequirement,
    pub user_presence_required: bool,
    pub extension_inputs: ClientExtensionInputs,
}

impl AuthenticationParameters {
    pub fn new(server_property: ServerProperty) -> Self {
        Self {
            server_property,
            allow_credentials: Vec::new(),
            user_verification: UserVerificationRequirement::default(),
            user_presence_required: true,
            extension_inputs: ClientExtensionInputs::default(),
        }
    }
}

/// `PublicKeyCredential` returned by `navigator.credentials.create()`,
/// in its JSON form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationResponse {
    pub id: String,
    pub raw_id: String,
    pub response: AuthenticatorAttestationResponse,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub attestation_object: String,
    #[serde(default)]
    pub transports: Vec<AuthenticatorTransport>,
}

/// `PublicKeyCredential` returned by `navigator.credentials.get()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResponse {
    pub id: String,
    pub raw_id: String,
    pub response: AuthenticatorAssertionResponse,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub client_extension_results: ClientExtensionOutputs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticator_attachment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorAssertionResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: String,
    pub authenticator_data: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<String>,
}

/// Decoded registration inputs, for callers that don't use the JSON shape.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    /// `rawId`, checked against the attested credential id when present.
    pub credential_id: Option<Vec<u8>>,
    pub client_data_json: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub transports: Vec<AuthenticatorTransport>,
    pub client_extension_outputs: ClientExtensionOutputs,
}

impl TryFrom<&RegistrationResponse> for RegistrationRequest {
    type Error = VerifyError;

    fn try_from(response: &RegistrationResponse) -> Result<Self, Self::Error> {
        Ok(Self {
            credential_id: Some(decode_credential_id(
                &response.id,
                &response.raw_id,
                &response.type_,
            )?),
            client_data_json: decode_field(&response.response.client_data_json, "clientDataJSON")?,
            attestation_object: decode_field(
                &response.response.attestation_object,
                "attestationObject",
            )?,
            transports: response.response.transports.clone(),
            client_extension_outputs: response.client_extension_results.clone(),
        })
    }
}

/// Decoded authentication inputs.
#[derive(Debug, Clone, Default)]
pub struct AuthenticationRequest {
    pub credential_id: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub client_data_json: Vec<u8>,
    pub authenticator_data: Vec<u8>,
    pub signature: Vec<u8>,
    pub client_extension_outputs: ClientExtensionOutputs,
}

impl TryFrom<&AuthenticationResponse> for AuthenticationRequest {
    type Error = VerifyError;

    fn try_from(response: &AuthenticationResponse) -> Result<Self, Self::Error> {
        let user_handle = match response.response.user_handle.as_deref() {
            None | Some("") => None,
            Some(handle) => Some(decode_field(handle, "userHandle")?),
        };
        Ok(Self {
            credential_id: decode_credential_id(&response.id, &response.raw_id, &response.type_)?,
            user_handle,
            client_data_json: decode_field(&response.response.client_data_json, "clientDataJSON")?,
            authenticator_data: decode_field(
                &response.response.authenticator_data,
                "authenticatorData",
            )?,
            signature: decode_field(&response.response.signature, "signature")?,
            client_extension_outputs: response.client_extension_results.clone(),
        })
    }
}

fn decode_field(value: &str, name: &str) -> Result<Vec<u8>, VerifyError> {
    base64url_decode(value)
        .map_err(|e| VerifyError::DataConversion(format!("Failed to decode {name}: {e}")))
}

fn decode_credential_id(id: &str, raw_id: &str, type_: &str) -> Result<Vec<u8>, VerifyError> {
    if type_ != "public-key" {
        return Err(VerifyError::ConstraintViolation(format!(
            "Credential type must be 'public-key', got '{type_}'"
        )));
    }
    let raw = decode_field(raw_id, "rawId")?;
    if decode_field(id, "id")? != raw {
        return Err(VerifyError::ConstraintViolation(
            "Credential id and rawId differ".to_string(),
        ));
    }
    Ok(raw)
}

/// A verified registration.
#[derive(Debug, Clone)]
pub struct RegistrationData {
    pub attestation_object: AttestationObject,
    pub attestation_object_bytes: Vec<u8>,
    pub collected_client_data: CollectedClientData,
    pub client_extension_outputs: ClientExtensionOutputs,
    pub transports: Vec<AuthenticatorTransport>,
    pub attestation_type: AttestationType,
}

impl RegistrationData {
    /// Record the caller should persist for later authentications.
    pub fn to_credential_record(&self) -> Result<CredentialRecord, VerifyError> {
        let auth_data = self.attestation_object.authenticator_data();
        let attested = auth_data.attested_credential_data().ok_or_else(|| {
            VerifyError::ConstraintViolation(
                "Attested credential data is required for registration".to_string(),
            )
        })?;
        let flags = auth_data.flags();

        let mut record = CredentialRecord::new(attested.clone(), i64::from(auth_data.sign_count()))?
            .with_transports(self.transports.clone())
            .with_attestation_type(self.attestation_type)
            .with_backup_flags(flags.is_backup_eligible(), flags.is_backed_up());
        if let Some(extensions) = auth_data.extensions() {
            record = record.with_authenticator_extensions(extensions.clone());
        }
        Ok(record)
    }
}

/// Outcome of comparing the stored signature counter with the presented one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterVerdict {
    /// One side is zero, the authenticator doesn't keep a counter.
    Skipped,
    Increased,
    /// Possible cloned authenticator.
    NotIncreased,
}

/// A verified authentication. The caller stores `new_sign_count`.
#[derive(Debug, Clone)]
pub struct AuthenticationData {
    pub credential_id: Vec<u8>,
    pub user_handle: Option<Vec<u8>>,
    pub authenticator_data: AuthenticatorData,
    pub authenticator_data_bytes: Vec<u8>,
    pub collected_client_data: CollectedClientData,
    pub client_extension_outputs: ClientExtensionOutputs,
    pub signature: Vec<u8>,
    pub counter_verdict: CounterVerdict,
    pub new_sign_count: u32,
}
