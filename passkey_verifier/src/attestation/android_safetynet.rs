use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use x509_parser::extensions::GeneralName;

use super::utils::unexpected_statement;
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::codec::CoseKey;
use crate::crypto::{parse_certificate, public_key_from_certificate};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType, require};
use crate::errors::VerifyError;
use crate::utils::{base64_decode, base64_encode, base64url_decode, sha256};

const SAFETYNET_HOSTNAME: &str = "attest.android.com";

/// Payload of a SafetyNet attestation response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SafetyNetPayload {
    nonce: String,
    timestamp_ms: i64,
    #[serde(default)]
    cts_profile_match: bool,
    #[serde(default)]
    basic_integrity: bool,
    advice: Option<String>,
}

struct SafetyNetResponse {
    alg: Algorithm,
    certificates: Vec<Vec<u8>>,
    signing_input: String,
    signature: String,
    payload: SafetyNetPayload,
}

/// `android-safetynet`: a SafetyNet attestation JWS whose nonce binds the
/// registration.
///
/// `timestampMs` must lie within `[now - backward, now + forward]`.
#[derive(Debug, Clone, Copy)]
pub struct AndroidSafetyNetAttestationVerifier {
    forward_threshold: Duration,
    backward_threshold: Duration,
}

impl Default for AndroidSafetyNetAttestationVerifier {
    fn default() -> Self {
        Self::new(Duration::zero(), Duration::seconds(60))
    }
}

impl AndroidSafetyNetAttestationVerifier {
    pub fn new(forward_threshold: Duration, backward_threshold: Duration) -> Self {
        Self {
            forward_threshold,
            backward_threshold,
        }
    }

    fn response<'a>(&self, object: &RegistrationObject<'a>) -> Result<&'a [u8], VerifyError> {
        let format = self.format();
        let AttestationStatement::AndroidSafetyNet(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };
        let ver = require(&statement.ver, "ver", format)?;
        if ver.is_empty() {
            return Err(VerifyError::ConstraintViolation(
                "ver must not be empty in android-safetynet attestation".to_string(),
            ));
        }
        require(&statement.response, "response", format).map(Vec::as_slice)
    }

    fn check_timestamp(&self, timestamp_ms: i64) -> Result<(), VerifyError> {
        let now = Utc::now().timestamp_millis();
        // A bound that overflows i64 leaves that side of the window open.
        let latest = now.checked_add(self.forward_threshold.num_milliseconds());
        let earliest = now.checked_sub(self.backward_threshold.num_milliseconds());
        if latest.is_some_and(|latest| timestamp_ms > latest) {
            return Err(VerifyError::BadAttestationStatement(
                "SafetyNet response timestampMs is in the future".to_string(),
            ));
        }
        if earliest.is_some_and(|earliest| timestamp_ms < earliest) {
            return Err(VerifyError::BadAttestationStatement(
                "SafetyNet response timestampMs is too old".to_string(),
            ));
        }
        Ok(())
    }
}

impl AttestationStatementVerifier for AndroidSafetyNetAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidSafetyNet
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let response = parse_response(self.response(object)?)?;

        let leaf = response.certificates.first().ok_or_else(|| {
            VerifyError::BadAttestationStatement(
                "SafetyNet response header has no x5c certificates".to_string(),
            )
        })?;
        check_hostname(leaf)?;
        verify_jws_signature(&response, leaf)?;

        let expected_nonce = base64_encode(&sha256(&object.signed_data()));
        if response.payload.nonce != expected_nonce {
            return Err(VerifyError::BadAttestationStatement(
                "SafetyNet nonce doesn't match authData and clientDataHash".to_string(),
            ));
        }

        tracing::debug!(
            "SafetyNet ctsProfileMatch: {}, basicIntegrity: {}",
            response.payload.cts_profile_match,
            response.payload.basic_integrity
        );
        if !response.payload.cts_profile_match {
            tracing::warn!(
                "SafetyNet device failed CTS profile match, advice: {:?}",
                response.payload.advice
            );
            return Err(VerifyError::BadAttestationStatement(
                "SafetyNet ctsProfileMatch is false".to_string(),
            ));
        }

        self.check_timestamp(response.payload.timestamp_ms)?;

        Ok(AttestationType::Basic)
    }

    /// The path lives in the JWS header rather than in `x5c`.
    fn trust_path(
        &self,
        object: &RegistrationObject<'_>,
    ) -> Result<Option<Vec<Vec<u8>>>, VerifyError> {
        let response = parse_response(self.response(object)?)?;
        Ok(Some(response.certificates))
    }
}

fn bad_response(what: impl std::fmt::Display) -> VerifyError {
    VerifyError::BadAttestationStatement(format!("Invalid SafetyNet response: {what}"))
}

fn parse_response(response: &[u8]) -> Result<SafetyNetResponse, VerifyError> {
    let token = std::str::from_utf8(response).map_err(bad_response)?;
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(bad_response("expected a compact JWS"));
    }

    let header = jsonwebtoken::decode_header(token).map_err(bad_response)?;
    let certificates = header
        .x5c
        .unwrap_or_default()
        .iter()
        .map(|cert| base64_decode(cert))
        .collect::<Result<Vec<_>, _>>()?;

    let payload_bytes = base64url_decode(parts[1])?;
    let payload: SafetyNetPayload = serde_json::from_slice(&payload_bytes).map_err(bad_response)?;

    Ok(SafetyNetResponse {
        alg: header.alg,
        certificates,
        signing_input: format!("{}.{}", parts[0], parts[1]),
        signature: parts[2].to_string(),
        payload,
    })
}

fn check_hostname(leaf: &[u8]) -> Result<(), VerifyError> {
    let cert = parse_certificate(leaf)?;
    let in_cn = cert
        .subject()
        .iter_common_name()
        .any(|cn| cn.as_str().is_ok_and(|cn| cn == SAFETYNET_HOSTNAME));
    let in_san = cert
        .subject_alternative_name()
        .ok()
        .flatten()
        .is_some_and(|san| {
            san.value
                .general_names
                .iter()
                .any(|name| matches!(name, GeneralName::DNSName(dns) if *dns == SAFETYNET_HOSTNAME))
        });
    if !in_cn && !in_san {
        return Err(VerifyError::Certificate(format!(
            "SafetyNet certificate is not issued to {SAFETYNET_HOSTNAME}"
        )));
    }
    Ok(())
}

fn verify_jws_signature(response: &SafetyNetResponse, leaf: &[u8]) -> Result<(), VerifyError> {
    let cert = parse_certificate(leaf)?;
    let key = match (response.alg, public_key_from_certificate(&cert)?) {
        (Algorithm::ES256, CoseKey::Ec2(ec2)) => {
            DecodingKey::from_ec_der(&ec2.uncompressed_point())
        }
        (Algorithm::RS256, CoseKey::Rsa(rsa)) => {
            DecodingKey::from_rsa_raw_components(rsa.n(), rsa.e())
        }
        (alg, _) => {
            return Err(VerifyError::BadAttestationStatement(format!(
                "SafetyNet JWS algorithm {alg:?} doesn't fit the certificate key"
            )));
        }
    };

    let valid = jsonwebtoken::crypto::verify(
        &response.signature,
        response.signing_input.as_bytes(),
        &key,
        response.alg,
    )
    .map_err(bad_response)?;
    if !valid {
        return Err(VerifyError::BadAttestationStatement(
            "SafetyNet JWS signature is invalid".to_string(),
        ));
    }
    Ok(())
}
