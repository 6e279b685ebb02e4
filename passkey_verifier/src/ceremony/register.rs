use super::WebAuthnVerifier;
use super::common::{check_client_data, check_flags, check_rp_id_hash};
use super::types::{RegistrationData, RegistrationParameters, RegistrationRequest};
use crate::attestation::RegistrationObject;
use crate::data::{AttestationObject, ClientDataType, CollectedClientData};
use crate::errors::VerifyError;

pub(super) fn verify_registration(
    verifier: &WebAuthnVerifier,
    request: RegistrationRequest,
    params: &RegistrationParameters,
) -> Result<RegistrationData, VerifyError> {
    let RegistrationRequest {
        credential_id,
        client_data_json,
        attestation_object: attestation_object_bytes,
        transports,
        client_extension_outputs,
    } = request;

    let attestation_object = AttestationObject::decode(&attestation_object_bytes)?;
    let collected_client_data = CollectedClientData::from_bytes(&client_data_json)?;
    let server = &params.server_property;

    check_client_data(&collected_client_data, ClientDataType::Create, server)?;

    let auth_data = attestation_object.authenticator_data();
    check_rp_id_hash(auth_data, &server.rp_id, None)?;
    check_flags(auth_data, params.user_verification, params.user_presence_required)?;

    let attested = auth_data.attested_credential_data().ok_or_else(|| {
        VerifyError::ConstraintViolation(
            "Attested credential data is required for registration".to_string(),
        )
    })?;
    if let Some(id) = credential_id.as_deref() {
        if id != attested.credential_id() {
            return Err(VerifyError::ConstraintViolation(
                "rawId doesn't match the attested credential id".to_string(),
            ));
        }
    }

    let alg = attested.credential_public_key().algorithm().ok_or_else(|| {
        VerifyError::BadAlgorithm("Credential public key has no algorithm".to_string())
    })?;
    if !params.allowed_algorithms.contains(&alg) {
        return Err(VerifyError::BadAlgorithm(format!(
            "{alg:?} is not among the allowed algorithms"
        )));
    }
    tracing::debug!(
        "Registering credential with AAGUID {} and algorithm {:?}",
        attested.aaguid(),
        alg
    );

    let object = RegistrationObject::new(&attestation_object, collected_client_data.hash());
    let outcome = verifier.attestation_verifiers.verify(&object)?;
    verifier
        .trust_policy
        .check(&outcome, attested.aaguid(), &verifier.cert_path_validator)?;

    client_extension_outputs.check_requested(&params.extension_inputs)?;

    Ok(RegistrationData {
        attestation_type: outcome.attestation_type,
        attestation_object,
        attestation_object_bytes,
        collected_client_data,
        client_extension_outputs,
        transports,
    })
}
