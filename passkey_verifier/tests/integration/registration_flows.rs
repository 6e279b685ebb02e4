use std::sync::Arc;

use passkey_verifier::anchor::InMemoryTrustAnchors;
use passkey_verifier::data::AuthenticatorTransport;
use passkey_verifier::{
    Aaguid, AttestationTrustPolicy, AttestationType, TrustAnchor, UserVerificationRequirement,
    VerifyError, WebAuthnVerifier,
};

use crate::common::{
    Attestation, AttestationCa, FLAG_UP, ORIGIN, SoftAuthenticator, b64url,
    registration_parameters,
};

fn strict_verifier(root_der: &[u8]) -> WebAuthnVerifier {
    let anchors = InMemoryTrustAnchors::new()
        .with_anchor(Aaguid::NULL, TrustAnchor::from_der(root_der.to_vec()).unwrap());
    WebAuthnVerifier::new(AttestationTrustPolicy::strict(Arc::new(anchors)))
}

#[test]
fn test_none_attestation_registration() {
    let authenticator = SoftAuthenticator::new(b"cred-none");
    let response = authenticator.create(Attestation::None, ORIGIN);

    let data = WebAuthnVerifier::default()
        .verify_registration(&response, &registration_parameters())
        .unwrap();
    assert_eq!(data.attestation_type, AttestationType::None);
    assert_eq!(
        data.transports,
        vec![AuthenticatorTransport::Usb, AuthenticatorTransport::Nfc]
    );

    let record = data.to_credential_record().unwrap();
    assert_eq!(record.credential_id(), b"cred-none");
    assert_eq!(record.sign_count(), 0);
    assert_eq!(record.attestation_type(), Some(AttestationType::None));
}

#[test]
fn test_packed_self_attestation_registration() {
    let authenticator = SoftAuthenticator::new(b"cred-self").with_sign_count(3);
    let response = authenticator.create(Attestation::PackedSelf, ORIGIN);

    let data = WebAuthnVerifier::default()
        .verify_registration(&response, &registration_parameters())
        .unwrap();
    assert_eq!(data.attestation_type, AttestationType::SelfAttestation);
    assert_eq!(data.to_credential_record().unwrap().sign_count(), 3);
}

#[test]
fn test_packed_full_attestation_against_trusted_root() {
    let ca = AttestationCa::generate();
    let authenticator = SoftAuthenticator::new(b"cred-packed");
    let response = authenticator.create(Attestation::PackedFull(&ca), ORIGIN);

    let data = strict_verifier(&ca.root_der)
        .verify_registration(&response, &registration_parameters())
        .unwrap();
    assert_eq!(data.attestation_type, AttestationType::Basic);
}

#[test]
fn test_packed_full_attestation_untrusted_root() {
    let ca = AttestationCa::generate();
    let other = AttestationCa::generate();
    let authenticator = SoftAuthenticator::new(b"cred-packed");
    let response = authenticator.create(Attestation::PackedFull(&ca), ORIGIN);

    let result = strict_verifier(&other.root_der)
        .verify_registration(&response, &registration_parameters());
    assert!(matches!(result, Err(VerifyError::Certificate(_))));

    // The same statement passes when trust is not evaluated.
    let data = WebAuthnVerifier::default()
        .verify_registration(&response, &registration_parameters())
        .unwrap();
    assert_eq!(data.attestation_type, AttestationType::Basic);
}

#[test]
fn test_strict_policy_rejects_none_attestation() {
    let ca = AttestationCa::generate();
    let authenticator = SoftAuthenticator::new(b"cred-none");
    let response = authenticator.create(Attestation::None, ORIGIN);

    let result = strict_verifier(&ca.root_der)
        .verify_registration(&response, &registration_parameters());
    assert!(matches!(result, Err(VerifyError::BadAttestationStatement(_))));
}

#[test]
fn test_registration_wrong_origin() {
    let authenticator = SoftAuthenticator::new(b"cred-none");
    let response = authenticator.create(Attestation::None, "https://evil.example.org");

    let result =
        WebAuthnVerifier::default().verify_registration(&response, &registration_parameters());
    assert!(matches!(result, Err(VerifyError::BadOrigin(_))));
}

#[test]
fn test_registration_requires_user_verification_when_asked() {
    let mut authenticator = SoftAuthenticator::new(b"cred-none");
    authenticator.flags = FLAG_UP;
    let response = authenticator.create(Attestation::None, ORIGIN);

    let mut params = registration_parameters();
    params.user_verification = UserVerificationRequirement::Required;
    let result = WebAuthnVerifier::default().verify_registration(&response, &params);
    assert!(matches!(result, Err(VerifyError::UserNotVerified)));

    params.user_verification = UserVerificationRequirement::Preferred;
    assert!(
        WebAuthnVerifier::default()
            .verify_registration(&response, &params)
            .is_ok()
    );
}

#[test]
fn test_registration_id_raw_id_mismatch() {
    let authenticator = SoftAuthenticator::new(b"cred-none");
    let mut response = authenticator.create(Attestation::None, ORIGIN);
    response.id = b64url(b"someone-else");

    let result =
        WebAuthnVerifier::default().verify_registration(&response, &registration_parameters());
    assert!(matches!(result, Err(VerifyError::ConstraintViolation(_))));
}

#[test]
fn test_registration_malformed_attestation_object() {
    let authenticator = SoftAuthenticator::new(b"cred-none");
    let mut response = authenticator.create(Attestation::None, ORIGIN);
    response.response.attestation_object = b64url(&[0xa1, 0x63]);

    let result =
        WebAuthnVerifier::default().verify_registration(&response, &registration_parameters());
    assert!(matches!(result, Err(VerifyError::DataConversion(_))));
}
