use super::WebAuthnVerifier;
use super::common::{check_client_data, check_flags, check_rp_id_hash};
use super::types::{
    AuthenticationData, AuthenticationParameters, AuthenticationRequest, CounterVerdict,
};
use crate::crypto::verify_with_cose_key;
use crate::data::{AuthenticatorData, ClientDataType, CollectedClientData, CredentialRecord};
use crate::errors::VerifyError;
use crate::utils::concat_signed_data;

/// Signature counter policy. Counters of zero mean the authenticator does
/// not implement one, so nothing can be concluded.
pub fn evaluate_counter(stored: u32, presented: u32) -> CounterVerdict {
    if stored == 0 || presented == 0 {
        CounterVerdict::Skipped
    } else if presented > stored {
        CounterVerdict::Increased
    } else {
        CounterVerdict::NotIncreased
    }
}

pub(super) fn verify_authentication(
    verifier: &WebAuthnVerifier,
    request: AuthenticationRequest,
    params: &AuthenticationParameters,
    credential: &CredentialRecord,
) -> Result<AuthenticationData, VerifyError> {
    let AuthenticationRequest {
        credential_id,
        user_handle,
        client_data_json,
        authenticator_data: authenticator_data_bytes,
        signature,
        client_extension_outputs,
    } = request;

    let authenticator_data = AuthenticatorData::parse(&authenticator_data_bytes)?;

    if !params.allow_credentials.is_empty() && !params.allow_credentials.contains(&credential_id) {
        return Err(VerifyError::NotAllowedCredential(
            "Credential is not in allowCredentials".to_string(),
        ));
    }
    if credential_id != credential.credential_id() {
        return Err(VerifyError::NotAllowedCredential(
            "Credential id doesn't match the stored credential".to_string(),
        ));
    }

    let collected_client_data = CollectedClientData::from_bytes(&client_data_json)?;
    let server = &params.server_property;
    check_client_data(&collected_client_data, ClientDataType::Get, server)?;

    let appid = if client_extension_outputs.appid == Some(true) {
        Some(params.extension_inputs.appid.as_deref().ok_or_else(|| {
            VerifyError::UnexpectedExtension(
                "appid output is true but no appid was requested".to_string(),
            )
        })?)
    } else {
        None
    };
    check_rp_id_hash(&authenticator_data, &server.rp_id, appid)?;
    check_flags(
        &authenticator_data,
        params.user_verification,
        params.user_presence_required,
    )?;

    let public_key = credential.attested_credential_data().credential_public_key();
    let alg = public_key.algorithm().ok_or_else(|| {
        VerifyError::BadAlgorithm("Stored credential public key has no algorithm".to_string())
    })?;
    let signed_data = concat_signed_data(&authenticator_data_bytes, collected_client_data.hash());
    verify_with_cose_key(public_key, alg, &signed_data, &signature)?;

    let stored = credential.sign_count();
    let presented = authenticator_data.sign_count();
    let counter_verdict = evaluate_counter(stored, presented);
    match counter_verdict {
        CounterVerdict::NotIncreased if verifier.fail_on_counter_regression => {
            return Err(VerifyError::CounterRegression { stored, presented });
        }
        CounterVerdict::NotIncreased => {
            tracing::warn!(
                "Signature counter did not increase (stored {}, presented {}), the authenticator may be cloned",
                stored,
                presented
            );
        }
        CounterVerdict::Skipped => {
            tracing::debug!("Authenticator does not support counters");
        }
        CounterVerdict::Increased => {}
    }

    client_extension_outputs.check_requested(&params.extension_inputs)?;

    Ok(AuthenticationData {
        credential_id,
        user_handle,
        authenticator_data,
        authenticator_data_bytes,
        collected_client_data,
        client_extension_outputs,
        signature,
        counter_verdict,
        new_sign_count: presented,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_counter_verdicts() {
        assert_eq!(evaluate_counter(0, 0), CounterVerdict::Skipped);
        assert_eq!(evaluate_counter(0, 7), CounterVerdict::Skipped);
        assert_eq!(evaluate_counter(7, 0), CounterVerdict::Skipped);
        assert_eq!(evaluate_counter(7, 8), CounterVerdict::Increased);
        assert_eq!(evaluate_counter(7, 7), CounterVerdict::NotIncreased);
        assert_eq!(evaluate_counter(7, 6), CounterVerdict::NotIncreased);
    }

    proptest! {
        #[test]
        fn test_counter_monotonicity(stored in 1u32.., presented in 1u32..) {
            let verdict = evaluate_counter(stored, presented);
            if presented > stored {
                prop_assert_eq!(verdict, CounterVerdict::Increased);
            } else {
                prop_assert_eq!(verdict, CounterVerdict::NotIncreased);
            }
        }
    }
}
