//! Registration and authentication ceremony verification.

mod auth;
mod common;
mod device_check;
mod register;
mod trustworthiness;
mod types;

use std::sync::Arc;

use crate::anchor::{CertFileTrustAnchors, CompositeTrustAnchors, PemBundleTrustAnchors};
use crate::attestation::{AndroidSafetyNetAttestationVerifier, AttestationVerifiers};
use crate::certpath::CertPathValidator;
use crate::config::VerifierConfig;
use crate::data::CredentialRecord;
use crate::errors::VerifyError;

pub use auth::evaluate_counter;
pub use device_check::{
    AppAttestEnvironment, DeviceCheckAssertion, DeviceCheckAssertionData,
    DeviceCheckAssertionParameters, DeviceCheckAssertionRequest, DeviceCheckAttestationData,
    DeviceCheckAttestationParameters, DeviceCheckAttestationRequest, DeviceCheckServerProperty,
    DeviceCheckVerifier,
};
pub use trustworthiness::AttestationTrustPolicy;
pub use types::{
    AuthenticationData, AuthenticationParameters, AuthenticationRequest, AuthenticationResponse,
    AuthenticatorAssertionResponse, AuthenticatorAttestationResponse, CounterVerdict,
    RegistrationData, RegistrationParameters, RegistrationRequest, RegistrationResponse,
    ServerProperty, UserVerificationRequirement, default_allowed_algorithms,
};

/// Stateless verifier for both ceremonies. Shareable across threads.
pub struct WebAuthnVerifier {
    attestation_verifiers: AttestationVerifiers,
    trust_policy: AttestationTrustPolicy,
    cert_path_validator: CertPathValidator,
    fail_on_counter_regression: bool,
}

impl Default for WebAuthnVerifier {
    fn default() -> Self {
        Self::new(AttestationTrustPolicy::Skip)
    }
}

impl WebAuthnVerifier {
    pub fn new(trust_policy: AttestationTrustPolicy) -> Self {
        Self {
            attestation_verifiers: AttestationVerifiers::default(),
            trust_policy,
            cert_path_validator: CertPathValidator::new(),
            fail_on_counter_regression: false,
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Result<Self, VerifyError> {
        let trust_policy = if config.strict_attestation {
            let mut resolver = CompositeTrustAnchors::new();
            if !config.trust_anchor_files.is_empty() {
                resolver = resolver.with_source(Arc::new(CertFileTrustAnchors::new(
                    config.trust_anchor_files.clone(),
                )));
            }
            if let Some(bundle) = &config.trust_anchor_bundle {
                resolver = resolver.with_source(Arc::new(PemBundleTrustAnchors::new(bundle)));
            }
            if resolver.is_empty() {
                return Err(VerifyError::Config(
                    "Strict attestation requires PASSKEY_TRUST_ANCHOR_FILES or PASSKEY_TRUST_ANCHOR_BUNDLE"
                        .to_string(),
                ));
            }
            AttestationTrustPolicy::Strict {
                resolver: Arc::new(resolver),
                allow_self_and_none: config.allow_self_and_none_attestation,
            }
        } else {
            AttestationTrustPolicy::Skip
        };

        let safetynet = AndroidSafetyNetAttestationVerifier::new(
            config.safetynet_forward_threshold,
            config.safetynet_backward_threshold,
        );
        Ok(Self::new(trust_policy)
            .with_attestation_verifiers(AttestationVerifiers::new(safetynet))
            .with_fail_on_counter_regression(config.fail_on_counter_regression))
    }

    pub fn with_attestation_verifiers(mut self, verifiers: AttestationVerifiers) -> Self {
        self.attestation_verifiers = verifiers;
        self
    }

    pub fn with_cert_path_validator(mut self, validator: CertPathValidator) -> Self {
        self.cert_path_validator = validator;
        self
    }

    /// Turns a counter that did not increase into a hard error instead of a
    /// verdict on the result.
    pub fn with_fail_on_counter_regression(mut self, fail: bool) -> Self {
        self.fail_on_counter_regression = fail;
        self
    }

    pub fn verify_registration(
        &self,
        response: &RegistrationResponse,
        params: &RegistrationParameters,
    ) -> Result<RegistrationData, VerifyError> {
        self.verify_registration_request(RegistrationRequest::try_from(response)?, params)
    }

    pub fn verify_registration_request(
        &self,
        request: RegistrationRequest,
        params: &RegistrationParameters,
    ) -> Result<RegistrationData, VerifyError> {
        register::verify_registration(self, request, params)
    }

    pub fn verify_authentication(
        &self,
        response: &AuthenticationResponse,
        params: &AuthenticationParameters,
        credential: &CredentialRecord,
    ) -> Result<AuthenticationData, VerifyError> {
        self.verify_authentication_request(
            AuthenticationRequest::try_from(response)?,
            params,
            credential,
        )
    }

    pub fn verify_authentication_request(
        &self,
        request: AuthenticationRequest,
        params: &AuthenticationParameters,
        credential: &CredentialRecord,
    ) -> Result<AuthenticationData, VerifyError> {
        auth::verify_authentication(self, request, params, credential)
    }
}
