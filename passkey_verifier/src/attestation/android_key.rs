use x509_parser::der_parser::ber::{BerObject, BerObjectContent};
use x509_parser::der_parser::der::parse_der;

use super::utils::{
    attestation_signature_error, check_certificate_key_matches, leaf_certificate, statement_alg,
    unexpected_statement,
};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::certpath::AttestationCertificate;
use crate::crypto::{ct_eq, verify_with_certificate};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType, require};
use crate::errors::VerifyError;

// Android Keystore attestation extension (KeyDescription)
const OID_ANDROID_KEY_DESCRIPTION: &str = "1.3.6.1.4.1.11129.2.1.17";

const KEY_DESCRIPTION_CHALLENGE: usize = 4;
const KEY_DESCRIPTION_SOFTWARE_ENFORCED: usize = 6;
const KEY_DESCRIPTION_TEE_ENFORCED: usize = 7;

const KM_TAG_PURPOSE: u32 = 1;
const KM_TAG_ALL_APPLICATIONS: u32 = 600;
const KM_TAG_ORIGIN: u32 = 702;
const KM_ORIGIN_GENERATED: u32 = 0;
const KM_PURPOSE_SIGN: u32 = 2;

/// `android-key`: keys generated in Android Keystore, attested by the
/// keystore's certificate chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct AndroidKeyAttestationVerifier;

impl AttestationStatementVerifier for AndroidKeyAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::AndroidKey
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::AndroidKey(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let alg = statement_alg(&statement.alg, format)?;
        let sig = require(&statement.sig, "sig", format)?;
        let leaf = leaf_certificate(&statement.x5c, format)?;
        let credential = object.credential()?;

        verify_with_certificate(leaf, alg, &object.signed_data(), sig)
            .map_err(attestation_signature_error)?;

        let cert = AttestationCertificate::from_der(leaf)?;
        check_certificate_key_matches(cert.inner(), credential.credential_public_key())?;

        let extension = cert.extension_value(OID_ANDROID_KEY_DESCRIPTION).ok_or_else(|| {
            VerifyError::BadAttestationStatement(
                "Android key attestation certificate has no key description extension".to_string(),
            )
        })?;
        check_key_description(extension, object.client_data_hash)?;

        Ok(AttestationType::Basic)
    }
}

fn malformed(what: &str) -> VerifyError {
    VerifyError::BadAttestationStatement(format!("Malformed key description: {what}"))
}

fn check_key_description(extension: &[u8], client_data_hash: &[u8]) -> Result<(), VerifyError> {
    let (_, description) = parse_der(extension).map_err(|e| malformed(&e.to_string()))?;
    let fields = description
        .as_sequence()
        .map_err(|_| malformed("not a SEQUENCE"))?;
    if fields.len() <= KEY_DESCRIPTION_TEE_ENFORCED {
        return Err(malformed("missing fields"));
    }

    let challenge = fields[KEY_DESCRIPTION_CHALLENGE]
        .as_slice()
        .map_err(|_| malformed("attestationChallenge is not an OCTET STRING"))?;
    if !ct_eq(challenge, client_data_hash) {
        return Err(VerifyError::BadAttestationStatement(
            "attestationChallenge doesn't match clientDataHash".to_string(),
        ));
    }

    let software = authorization_list(&fields[KEY_DESCRIPTION_SOFTWARE_ENFORCED])?;
    let tee = authorization_list(&fields[KEY_DESCRIPTION_TEE_ENFORCED])?;
    let all = || software.iter().chain(tee.iter());

    if all().any(|(tag, _)| *tag == KM_TAG_ALL_APPLICATIONS) {
        return Err(VerifyError::BadAttestationStatement(
            "Key is scoped to all applications".to_string(),
        ));
    }

    let origin = all()
        .find(|(tag, _)| *tag == KM_TAG_ORIGIN)
        .ok_or_else(|| malformed("origin is missing"))
        .and_then(|(_, value)| explicit_u32(value))?;
    if origin != KM_ORIGIN_GENERATED {
        return Err(VerifyError::BadAttestationStatement(format!(
            "Key origin must be KM_ORIGIN_GENERATED, got {origin}"
        )));
    }

    let mut has_sign_purpose = false;
    for (_, value) in all().filter(|(tag, _)| *tag == KM_TAG_PURPOSE) {
        let (_, set) = parse_der(value).map_err(|e| malformed(&e.to_string()))?;
        let purposes = set.as_set().map_err(|_| malformed("purpose is not a SET"))?;
        for purpose in purposes {
            if purpose.as_u32().map_err(|_| malformed("purpose is not an INTEGER"))?
                == KM_PURPOSE_SIGN
            {
                has_sign_purpose = true;
            }
        }
    }
    if !has_sign_purpose {
        return Err(VerifyError::BadAttestationStatement(
            "Key purpose must include KM_PURPOSE_SIGN".to_string(),
        ));
    }
    Ok(())
}

/// `(tag, explicit content)` for every entry of an AuthorizationList.
fn authorization_list<'a>(list: &'a BerObject<'a>) -> Result<Vec<(u32, &'a [u8])>, VerifyError> {
    let entries = list
        .as_sequence()
        .map_err(|_| malformed("authorization list is not a SEQUENCE"))?;
    entries
        .iter()
        .map(|entry| match &entry.content {
            BerObjectContent::Unknown(any) => Ok((entry.header.tag().0, any.as_bytes())),
            _ => Err(malformed("authorization list entry is not context tagged")),
        })
        .collect()
}

fn explicit_u32(value: &[u8]) -> Result<u32, VerifyError> {
    let (_, inner) = parse_der(value).map_err(|e| malformed(&e.to_string()))?;
    inner
        .as_u32()
        .map_err(|_| malformed("expected an INTEGER"))
}
