//! App Attest (DeviceCheck) ceremonies.
//!
//! An iOS app attests a key generated in the Secure Enclave, then signs
//! assertions with it. Both messages reuse the WebAuthn authenticator data
//! layout, with the app identifier (`<team id>.<bundle id>`) in place of
//! the RP ID. There is no `clientDataJSON`: the app sends the hash of its
//! client data, which must be SHA-256 of the server challenge.

use ciborium::value::Value as CborValue;

use super::common::check_rp_id_hash;
use super::trustworthiness::AttestationTrustPolicy;
use crate::attestation::{AttestationVerifiers, RegistrationObject};
use crate::certpath::CertPathValidator;
use crate::codec::{CoseAlgorithm, CoseCurve, CoseKey, cbor};
use crate::crypto::{ct_eq, verify_with_cose_key};
use crate::data::{
    Aaguid, AttestationObject, AttestationStatement, AttestationType, AuthenticatorData,
    CredentialRecord,
};
use crate::errors::VerifyError;
use crate::utils::{concat_signed_data, sha256};

const AAGUID_PRODUCTION: Aaguid = Aaguid::new(*b"appattest\0\0\0\0\0\0\0");
const AAGUID_DEVELOPMENT: Aaguid = Aaguid::new(*b"appattestdevelop");

/// Which App Attest service issued the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppAttestEnvironment {
    #[default]
    Production,
    Development,
}

impl AppAttestEnvironment {
    pub fn aaguid(self) -> Aaguid {
        match self {
            Self::Production => AAGUID_PRODUCTION,
            Self::Development => AAGUID_DEVELOPMENT,
        }
    }
}

/// What the app server knows about the ceremony it started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCheckServerProperty {
    pub app_identifier: String,
    pub challenge: Vec<u8>,
}

impl DeviceCheckServerProperty {
    pub fn new(app_identifier: impl Into<String>, challenge: Vec<u8>) -> Self {
        Self {
            app_identifier: app_identifier.into(),
            challenge,
        }
    }

    pub fn from_team_and_bundle(
        team_identifier: &str,
        bundle_identifier: &str,
        challenge: Vec<u8>,
    ) -> Self {
        Self::new(format!("{team_identifier}.{bundle_identifier}"), challenge)
    }

    fn check_client_data_hash(&self, client_data_hash: &[u8]) -> Result<[u8; 32], VerifyError> {
        let hash: [u8; 32] = client_data_hash.try_into().map_err(|_| {
            VerifyError::DataConversion(format!(
                "clientDataHash must be 32 bytes, got {}",
                client_data_hash.len()
            ))
        })?;
        if !ct_eq(&hash, &sha256(&self.challenge)) {
            return Err(VerifyError::BadChallenge(
                "clientDataHash doesn't match the issued challenge".to_string(),
            ));
        }
        Ok(hash)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceCheckAttestationRequest {
    /// Key identifier the app received from `generateKey`.
    pub key_id: Vec<u8>,
    pub attestation_object: Vec<u8>,
    pub client_data_hash: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DeviceCheckAttestationParameters {
    pub server_property: DeviceCheckServerProperty,
    pub environment: AppAttestEnvironment,
}

impl DeviceCheckAttestationParameters {
    pub fn new(server_property: DeviceCheckServerProperty) -> Self {
        Self {
            server_property,
            environment: AppAttestEnvironment::default(),
        }
    }

    pub fn with_environment(mut self, environment: AppAttestEnvironment) -> Self {
        self.environment = environment;
        self
    }
}

#[derive(Debug, Clone)]
pub struct DeviceCheckAttestationData {
    pub key_id: Vec<u8>,
    pub attestation_object: AttestationObject,
    pub attestation_type: AttestationType,
    /// Receipt to redeem with Apple for fraud risk metrics.
    pub receipt: Vec<u8>,
}

impl DeviceCheckAttestationData {
    /// Record the app server should persist for later assertions.
    pub fn to_credential_record(&self) -> Result<CredentialRecord, VerifyError> {
        let auth_data = self.attestation_object.authenticator_data();
        let attested = auth_data.attested_credential_data().ok_or_else(|| {
            VerifyError::ConstraintViolation(
                "Attested credential data is required for App Attest".to_string(),
            )
        })?;
        let record = CredentialRecord::new(attested.clone(), i64::from(auth_data.sign_count()))?;
        Ok(record.with_attestation_type(self.attestation_type))
    }
}

#[derive(Debug, Clone, Default)]
pub struct DeviceCheckAssertionRequest {
    pub key_id: Vec<u8>,
    /// CBOR map of `signature` and `authenticatorData`.
    pub assertion: Vec<u8>,
    pub client_data_hash: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DeviceCheckAssertionParameters {
    pub server_property: DeviceCheckServerProperty,
}

impl DeviceCheckAssertionParameters {
    pub fn new(server_property: DeviceCheckServerProperty) -> Self {
        Self { server_property }
    }
}

/// Decoded App Attest assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCheckAssertion {
    pub signature: Vec<u8>,
    pub authenticator_data: Vec<u8>,
}

impl DeviceCheckAssertion {
    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        let entries = cbor::into_map(cbor::decode(bytes)?, "App Attest assertion")?;
        let field = |name: &str| -> Result<Vec<u8>, VerifyError> {
            let value = cbor::get_text_key(&entries, name).ok_or_else(|| {
                VerifyError::ConstraintViolation(format!(
                    "{name} is required in an App Attest assertion"
                ))
            })?;
            Ok(cbor::as_bytes(value, name)?.to_vec())
        };
        Ok(Self {
            signature: field("signature")?,
            authenticator_data: field("authenticatorData")?,
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, VerifyError> {
        cbor::encode(&CborValue::Map(vec![
            (
                CborValue::Text("signature".to_string()),
                CborValue::Bytes(self.signature.clone()),
            ),
            (
                CborValue::Text("authenticatorData".to_string()),
                CborValue::Bytes(self.authenticator_data.clone()),
            ),
        ]))
    }
}

#[derive(Debug, Clone)]
pub struct DeviceCheckAssertionData {
    pub key_id: Vec<u8>,
    pub authenticator_data: AuthenticatorData,
    pub signature: Vec<u8>,
    /// Counter to store for the next assertion.
    pub new_sign_count: u32,
}

/// Verifier for App Attest attestations and assertions.
pub struct DeviceCheckVerifier {
    attestation_verifiers: AttestationVerifiers,
    trust_policy: AttestationTrustPolicy,
    cert_path_validator: CertPathValidator,
}

impl Default for DeviceCheckVerifier {
    fn default() -> Self {
        Self::new(AttestationTrustPolicy::Skip)
    }
}

impl DeviceCheckVerifier {
    /// A strict policy should resolve the Apple App Attestation Root CA.
    pub fn new(trust_policy: AttestationTrustPolicy) -> Self {
        Self {
            attestation_verifiers: AttestationVerifiers::app_attest(),
            trust_policy,
            cert_path_validator: CertPathValidator::new(),
        }
    }

    pub fn with_cert_path_validator(mut self, validator: CertPathValidator) -> Self {
        self.cert_path_validator = validator;
        self
    }

    pub fn verify_attestation(
        &self,
        request: DeviceCheckAttestationRequest,
        params: &DeviceCheckAttestationParameters,
    ) -> Result<DeviceCheckAttestationData, VerifyError> {
        let DeviceCheckAttestationRequest {
            key_id,
            attestation_object,
            client_data_hash,
        } = request;

        let attestation_object = AttestationObject::decode(&attestation_object)?;
        let server = &params.server_property;
        let client_data_hash = server.check_client_data_hash(&client_data_hash)?;

        let auth_data = attestation_object.authenticator_data();
        check_rp_id_hash(auth_data, &server.app_identifier, None)?;
        if auth_data.sign_count() != 0 {
            return Err(VerifyError::ConstraintViolation(format!(
                "App Attest counter must be 0 at attestation, got {}",
                auth_data.sign_count()
            )));
        }

        let attested = auth_data.attested_credential_data().ok_or_else(|| {
            VerifyError::ConstraintViolation(
                "Attested credential data is required for App Attest".to_string(),
            )
        })?;
        let expected_aaguid = params.environment.aaguid();
        if attested.aaguid() != expected_aaguid {
            return Err(VerifyError::ConstraintViolation(format!(
                "AAGUID {} is not the {:?} App Attest AAGUID",
                attested.aaguid(),
                params.environment
            )));
        }
        if !ct_eq(attested.credential_id(), &key_id) {
            return Err(VerifyError::ConstraintViolation(
                "Credential id doesn't match the key identifier".to_string(),
            ));
        }
        check_key_id(attested.credential_public_key(), &key_id)?;

        let object = RegistrationObject::new(&attestation_object, &client_data_hash);
        let outcome = self.attestation_verifiers.verify(&object)?;
        self.trust_policy
            .check(&outcome, attested.aaguid(), &self.cert_path_validator)?;

        let receipt = match attestation_object.attestation_statement() {
            AttestationStatement::AppleAppAttest(statement) => statement.receipt.clone(),
            _ => None,
        }
        .ok_or_else(|| {
            VerifyError::ConstraintViolation("App Attest receipt is missing".to_string())
        })?;
        tracing::debug!(
            "App Attest key attested for {} ({:?})",
            server.app_identifier,
            params.environment
        );

        Ok(DeviceCheckAttestationData {
            key_id,
            attestation_type: outcome.attestation_type,
            attestation_object,
            receipt,
        })
    }

    pub fn verify_assertion(
        &self,
        request: DeviceCheckAssertionRequest,
        params: &DeviceCheckAssertionParameters,
        credential: &CredentialRecord,
    ) -> Result<DeviceCheckAssertionData, VerifyError> {
        let DeviceCheckAssertionRequest {
            key_id,
            assertion,
            client_data_hash,
        } = request;

        if !ct_eq(&key_id, credential.credential_id()) {
            return Err(VerifyError::NotAllowedCredential(
                "Key identifier doesn't match the stored credential".to_string(),
            ));
        }
        let DeviceCheckAssertion {
            signature,
            authenticator_data: authenticator_data_bytes,
        } = DeviceCheckAssertion::decode(&assertion)?;
        let server = &params.server_property;
        let client_data_hash = server.check_client_data_hash(&client_data_hash)?;

        let authenticator_data = AuthenticatorData::parse(&authenticator_data_bytes)?;
        check_rp_id_hash(&authenticator_data, &server.app_identifier, None)?;

        // The key signs the nonce, not `authData || clientDataHash` itself.
        let nonce = sha256(&concat_signed_data(
            &authenticator_data_bytes,
            &client_data_hash,
        ));
        let public_key = credential.attested_credential_data().credential_public_key();
        verify_with_cose_key(public_key, CoseAlgorithm::ES256, &nonce, &signature)?;

        let stored = credential.sign_count();
        let presented = authenticator_data.sign_count();
        if presented <= stored {
            return Err(VerifyError::CounterRegression { stored, presented });
        }

        Ok(DeviceCheckAssertionData {
            key_id,
            authenticator_data,
            signature,
            new_sign_count: presented,
        })
    }
}

/// The key identifier is SHA-256 of the uncompressed P-256 public point.
fn check_key_id(key: &CoseKey, key_id: &[u8]) -> Result<(), VerifyError> {
    let CoseKey::Ec2(ec2) = key else {
        return Err(VerifyError::BadAlgorithm(
            "App Attest keys must be EC2 P-256 keys".to_string(),
        ));
    };
    if ec2.curve() != CoseCurve::P256 {
        return Err(VerifyError::BadAlgorithm(format!(
            "App Attest keys must use P-256, got {:?}",
            ec2.curve()
        )));
    }
    if !ct_eq(&sha256(&ec2.uncompressed_point()), key_id) {
        return Err(VerifyError::PublicKeyMismatch(
            "Key identifier is not the hash of the attested public key".to_string(),
        ));
    }
    Ok(())
}
