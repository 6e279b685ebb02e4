use super::utils::{
    attestation_signature_error, leaf_certificate, statement_alg, unexpected_statement,
};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::certpath::AttestationCertificate;
use crate::codec::cose::strip_leading_zeros;
use crate::codec::tpm::{TPM_GENERATED_VALUE, TPM_ST_ATTEST_CERTIFY};
use crate::codec::{
    CoseCurve, CoseKey, TpmAlgHash, TpmEccCurve, TpmsAttest, TpmtPublic, TpmuPublic,
};
use crate::crypto::{ct_eq, verify_with_certificate};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType, require};
use crate::errors::VerifyError;

// tcg-kp-AIKCertificate
const OID_TCG_KP_AIK_CERTIFICATE: &str = "2.23.133.8.3";
const DEFAULT_RSA_EXPONENT: [u8; 3] = [0x01, 0x00, 0x01];

/// `tpm`: the credential key is certified by a TPM attestation identity
/// key whose certificate comes from an attestation CA.
#[derive(Debug, Clone, Copy, Default)]
pub struct TpmAttestationVerifier;

impl AttestationStatementVerifier for TpmAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::Tpm
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::Tpm(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let ver = require(&statement.ver, "ver", format)?;
        if ver != "2.0" {
            return Err(VerifyError::BadAttestationStatement(format!(
                "Unsupported TPM version: {ver}"
            )));
        }
        if statement.ecdaa_key_id.is_some() {
            return Err(VerifyError::NotImplemented(
                "ECDAA attestation is not supported".to_string(),
            ));
        }

        let alg = statement_alg(&statement.alg, format)?;
        let sig = require(&statement.sig, "sig", format)?;
        let cert_info_bytes = require(&statement.cert_info, "certInfo", format)?;
        let pub_area_bytes = require(&statement.pub_area, "pubArea", format)?;
        let aik = leaf_certificate(&statement.x5c, format)?;
        let credential = object.credential()?;

        let pub_area = TpmtPublic::decode(pub_area_bytes)?;
        check_pub_area_key(&pub_area, credential.credential_public_key())?;

        let cert_info = TpmsAttest::decode(cert_info_bytes)?;
        check_cert_info(&cert_info, &pub_area, pub_area_bytes, alg, &object.signed_data())?;

        verify_with_certificate(aik, alg, cert_info_bytes, sig)
            .map_err(attestation_signature_error)?;

        let cert = AttestationCertificate::from_der(aik)?;
        check_aik_certificate(&cert)?;
        cert.check_aaguid(credential.aaguid())?;

        Ok(AttestationType::AttCa)
    }
}

fn check_pub_area_key(pub_area: &TpmtPublic, credential_key: &CoseKey) -> Result<(), VerifyError> {
    let matches = match (&pub_area.key, credential_key) {
        (TpmuPublic::Rsa { parameters, n }, CoseKey::Rsa(rsa)) => {
            let exponent = if parameters.exponent == 0 {
                DEFAULT_RSA_EXPONENT.to_vec()
            } else {
                parameters.exponent.to_be_bytes().to_vec()
            };
            strip_leading_zeros(n) == strip_leading_zeros(rsa.n())
                && strip_leading_zeros(&exponent) == strip_leading_zeros(rsa.e())
        }
        (TpmuPublic::Ecc { parameters, x, y }, CoseKey::Ec2(ec2)) => {
            let curve = match parameters.curve_id {
                TpmEccCurve::NistP256 => CoseCurve::P256,
                TpmEccCurve::NistP384 => CoseCurve::P384,
                TpmEccCurve::NistP521 => CoseCurve::P521,
            };
            curve == ec2.curve() && x.as_slice() == ec2.x() && y.as_slice() == ec2.y()
        }
        _ => false,
    };

    if !matches {
        return Err(VerifyError::PublicKeyMismatch(
            "pubArea key doesn't match credential public key".to_string(),
        ));
    }
    Ok(())
}

fn check_cert_info(
    cert_info: &TpmsAttest,
    pub_area: &TpmtPublic,
    pub_area_bytes: &[u8],
    alg: crate::codec::CoseAlgorithm,
    att_to_be_signed: &[u8],
) -> Result<(), VerifyError> {
    if cert_info.magic != TPM_GENERATED_VALUE {
        return Err(VerifyError::BadAttestationStatement(format!(
            "Invalid certInfo magic: 0x{:08x}",
            cert_info.magic
        )));
    }
    if cert_info.attest_type != TPM_ST_ATTEST_CERTIFY {
        return Err(VerifyError::BadAttestationStatement(format!(
            "Invalid certInfo type: 0x{:04x}",
            cert_info.attest_type
        )));
    }

    let digest_alg = alg.digest().ok_or_else(|| {
        VerifyError::BadAttestationStatement(format!("{alg:?} cannot be used for TPM attestation"))
    })?;
    let expected_extra_data = ring::digest::digest(digest_alg, att_to_be_signed);
    if !ct_eq(&cert_info.extra_data, expected_extra_data.as_ref()) {
        tracing::debug!("extraData: {:?}", cert_info.extra_data);
        return Err(VerifyError::BadAttestationStatement(
            "certInfo extraData doesn't match hash of attToBeSigned".to_string(),
        ));
    }

    let name_alg = TpmAlgHash::from_u16(pub_area.name_alg)?;
    let mut expected_name = name_alg.value().to_be_bytes().to_vec();
    expected_name.extend_from_slice(&name_alg.digest(pub_area_bytes));
    if cert_info.attested_name != expected_name {
        return Err(VerifyError::BadAttestationStatement(
            "certInfo attested name doesn't match pubArea".to_string(),
        ));
    }
    Ok(())
}

fn check_aik_certificate(cert: &AttestationCertificate<'_>) -> Result<(), VerifyError> {
    cert.require_v3()?;
    if !cert.has_empty_subject() {
        return Err(VerifyError::Certificate(
            "AIK certificate subject must be empty".to_string(),
        ));
    }

    let eku = cert
        .inner()
        .extended_key_usage()
        .map_err(|e| VerifyError::Certificate(format!("Invalid extended key usage: {e}")))?;
    let has_aik_eku = eku.is_some_and(|eku| {
        eku.value
            .other
            .iter()
            .any(|oid| oid.to_id_string() == OID_TCG_KP_AIK_CERTIFICATE)
    });
    if !has_aik_eku {
        return Err(VerifyError::Certificate(
            "AIK certificate must have the tcg-kp-AIKCertificate extended key usage".to_string(),
        ));
    }

    cert.require_not_ca()
}
