use passkey_verifier::{CounterVerdict, CredentialRecord, VerifyError, WebAuthnVerifier};

use crate::common::{
    Attestation, CHALLENGE, ORIGIN, SoftAuthenticator, authentication_parameters,
    registration_parameters,
};

fn enroll(authenticator: &SoftAuthenticator) -> CredentialRecord {
    let response = authenticator.create(Attestation::PackedSelf, ORIGIN);
    WebAuthnVerifier::default()
        .verify_registration(&response, &registration_parameters())
        .unwrap()
        .to_credential_record()
        .unwrap()
}

#[test]
fn test_authentication_with_increasing_counter() {
    let mut authenticator = SoftAuthenticator::new(b"cred-auth").with_sign_count(10);
    let mut record = enroll(&authenticator);
    let verifier = WebAuthnVerifier::default();

    for expected in 11..=13 {
        let response = authenticator.get(CHALLENGE, ORIGIN);
        let data = verifier
            .verify_authentication(&response, &authentication_parameters(), &record)
            .unwrap();
        assert_eq!(data.counter_verdict, CounterVerdict::Increased);
        assert_eq!(data.new_sign_count, expected);
        assert_eq!(data.user_handle.as_deref(), Some(&b"user-1234"[..]));
        record.set_sign_count(i64::from(data.new_sign_count)).unwrap();
    }
    assert_eq!(record.sign_count(), 13);
}

#[test]
fn test_authentication_zero_counter_is_skipped() {
    let mut authenticator = SoftAuthenticator::new(b"cred-zero");
    let record = enroll(&authenticator);

    let response = authenticator.get(CHALLENGE, ORIGIN);
    let data = WebAuthnVerifier::default()
        .verify_authentication(&response, &authentication_parameters(), &record)
        .unwrap();
    assert_eq!(data.counter_verdict, CounterVerdict::Skipped);
    assert_eq!(data.new_sign_count, 0);
}

#[test]
fn test_authentication_counter_regression() {
    let authenticator = SoftAuthenticator::new(b"cred-clone").with_sign_count(20);
    let record = enroll(&authenticator);
    let cloned = SoftAuthenticator {
        credential_id: authenticator.credential_id.clone(),
        key: authenticator.key,
        sign_count: 7,
        flags: authenticator.flags,
    };
    let response = cloned.assert_with_current_count(CHALLENGE, ORIGIN);

    let data = WebAuthnVerifier::default()
        .verify_authentication(&response, &authentication_parameters(), &record)
        .unwrap();
    assert_eq!(data.counter_verdict, CounterVerdict::NotIncreased);

    let result = WebAuthnVerifier::default()
        .with_fail_on_counter_regression(true)
        .verify_authentication(&response, &authentication_parameters(), &record);
    assert!(matches!(
        result,
        Err(VerifyError::CounterRegression {
            stored: 20,
            presented: 7
        })
    ));
}

#[test]
fn test_authentication_wrong_challenge() {
    let mut authenticator = SoftAuthenticator::new(b"cred-auth");
    let record = enroll(&authenticator);

    let response = authenticator.get(b"stale-challenge", ORIGIN);
    let result = WebAuthnVerifier::default().verify_authentication(
        &response,
        &authentication_parameters(),
        &record,
    );
    assert!(matches!(result, Err(VerifyError::BadChallenge(_))));
}

#[test]
fn test_authentication_signature_from_other_key() {
    let authenticator = SoftAuthenticator::new(b"cred-auth");
    let record = enroll(&authenticator);

    let impostor = SoftAuthenticator::new(b"cred-auth");
    let response = impostor.assert_with_current_count(CHALLENGE, ORIGIN);
    let result = WebAuthnVerifier::default().verify_authentication(
        &response,
        &authentication_parameters(),
        &record,
    );
    assert!(matches!(result, Err(VerifyError::BadSignature(_))));
}

#[test]
fn test_authentication_credential_not_allowed() {
    let authenticator = SoftAuthenticator::new(b"cred-auth");
    let record = enroll(&authenticator);
    let response = authenticator.assert_with_current_count(CHALLENGE, ORIGIN);

    let mut params = authentication_parameters();
    params.allow_credentials = vec![b"another".to_vec()];
    let result = WebAuthnVerifier::default().verify_authentication(&response, &params, &record);
    assert!(matches!(result, Err(VerifyError::NotAllowedCredential(_))));

    params.allow_credentials.push(b"cred-auth".to_vec());
    assert!(
        WebAuthnVerifier::default()
            .verify_authentication(&response, &params, &record)
            .is_ok()
    );
}

#[test]
fn test_authentication_rejects_registration_client_data() {
    let authenticator = SoftAuthenticator::new(b"cred-auth");
    let record = enroll(&authenticator);
    let mut response = authenticator.assert_with_current_count(CHALLENGE, ORIGIN);
    response.response.client_data_json = crate::common::b64url(&crate::common::client_data(
        "webauthn.create",
        CHALLENGE,
        ORIGIN,
    ));

    let result = WebAuthnVerifier::default().verify_authentication(
        &response,
        &authentication_parameters(),
        &record,
    );
    assert!(matches!(result, Err(VerifyError::ClientData(_))));
}
