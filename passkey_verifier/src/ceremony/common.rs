//! Checks shared by registration and authentication.

use super::types::{ServerProperty, UserVerificationRequirement};
use crate::crypto::ct_eq;
use crate::data::{AuthenticatorData, ClientDataType, CollectedClientData};
use crate::errors::VerifyError;
use crate::utils::sha256;

pub(super) fn check_client_data(
    client_data: &CollectedClientData,
    expected_type: ClientDataType,
    server: &ServerProperty,
) -> Result<(), VerifyError> {
    if *client_data.client_data_type() != expected_type {
        return Err(VerifyError::ClientData(format!(
            "Invalid client data type: expected {}, got {}",
            expected_type.as_str(),
            client_data.client_data_type().as_str()
        )));
    }

    if !ct_eq(client_data.challenge(), &server.challenge) {
        return Err(VerifyError::BadChallenge(
            "Challenge in client data doesn't match the issued challenge".to_string(),
        ));
    }

    if !server.origins.iter().any(|o| o == client_data.origin()) {
        return Err(VerifyError::BadOrigin(format!(
            "Origin {} is not allowed",
            client_data.origin()
        )));
    }
    if client_data.cross_origin() == Some(true) {
        tracing::debug!(
            "Cross origin ceremony, top origin: {:?}",
            client_data.top_origin()
        );
    }

    if let Some(token_binding) = client_data.token_binding() {
        token_binding.check(server.token_binding_id.as_deref())?;
    }
    Ok(())
}

/// `rpIdHash` must be SHA-256 of the RP ID, or of the legacy AppID when the
/// client reports it used one.
pub(super) fn check_rp_id_hash(
    auth_data: &AuthenticatorData,
    rp_id: &str,
    appid: Option<&str>,
) -> Result<(), VerifyError> {
    let expected = match appid {
        Some(appid) => {
            tracing::debug!("Verifying rpIdHash against AppID {}", appid);
            sha256(appid.as_bytes())
        }
        None => sha256(rp_id.as_bytes()),
    };
    if !ct_eq(auth_data.rp_id_hash(), &expected) {
        return Err(VerifyError::BadRpId(format!(
            "rpIdHash doesn't match the hash of {}",
            appid.unwrap_or(rp_id)
        )));
    }
    Ok(())
}

pub(super) fn check_flags(
    auth_data: &AuthenticatorData,
    user_verification: UserVerificationRequirement,
    user_presence_required: bool,
) -> Result<(), VerifyError> {
    let flags = auth_data.flags();
    tracing::debug!("Authenticator flags: {:?}", flags);

    if user_presence_required && !flags.is_user_present() {
        return Err(VerifyError::UserNotPresent);
    }
    if user_verification.is_required() && !flags.is_user_verified() {
        return Err(VerifyError::UserNotVerified);
    }
    if flags.is_backed_up() && !flags.is_backup_eligible() {
        return Err(VerifyError::ConstraintViolation(
            "Backup state is set on a credential that is not backup eligible".to_string(),
        ));
    }
    Ok(())
}
