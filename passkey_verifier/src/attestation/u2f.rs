use x509_parser::prelude::*;

use super::utils::{attestation_signature_error, leaf_certificate, unexpected_statement};
use super::{AttestationStatementVerifier, RegistrationObject};
use crate::codec::{CoseAlgorithm, CoseCurve, CoseKey};
use crate::crypto::{parse_certificate, public_key_from_certificate, verify_with_certificate};
use crate::data::{AttestationFormat, AttestationStatement, AttestationType, require};
use crate::errors::VerifyError;

/// `fido-u2f`: legacy CTAP1 security keys. The attestation certificate
/// signs a fixed registration message.
#[derive(Debug, Clone, Copy, Default)]
pub struct FidoU2fAttestationVerifier;

impl AttestationStatementVerifier for FidoU2fAttestationVerifier {
    fn format(&self) -> AttestationFormat {
        AttestationFormat::FidoU2f
    }

    fn verify(&self, object: &RegistrationObject<'_>) -> Result<AttestationType, VerifyError> {
        let format = self.format();
        let AttestationStatement::FidoU2f(statement) =
            object.attestation_object.attestation_statement()
        else {
            return Err(unexpected_statement(format));
        };

        let sig = require(&statement.sig, "sig", format)?;
        if statement.x5c.as_ref().map(Vec::len) != Some(1) {
            return Err(VerifyError::BadAttestationStatement(
                "fido-u2f attestation requires exactly one certificate".to_string(),
            ));
        }
        let leaf = leaf_certificate(&statement.x5c, format)?;

        let cert = parse_certificate(leaf)?;
        match public_key_from_certificate(&cert)? {
            CoseKey::Ec2(key) if key.curve() == CoseCurve::P256 => {}
            _ => {
                return Err(VerifyError::BadAttestationStatement(
                    "fido-u2f attestation certificate must carry a P-256 key".to_string(),
                ));
            }
        }
        if is_ca_certificate(&cert) {
            return Err(VerifyError::Certificate(
                "fido-u2f attestation certificate must not be a CA certificate".to_string(),
            ));
        }

        let credential = object.credential()?;
        let CoseKey::Ec2(credential_key) = credential.credential_public_key() else {
            return Err(VerifyError::BadAttestationStatement(
                "fido-u2f credential public key must be an EC2 key".to_string(),
            ));
        };
        if credential_key.curve() != CoseCurve::P256 {
            return Err(VerifyError::BadAttestationStatement(
                "fido-u2f credential public key must use P-256".to_string(),
            ));
        }

        let rp_id_hash = object.attestation_object.authenticator_data().rp_id_hash();
        let credential_id = credential.credential_id();
        let mut verification_data =
            Vec::with_capacity(1 + 32 + 32 + credential_id.len() + 65);
        verification_data.push(0x00);
        verification_data.extend_from_slice(rp_id_hash);
        verification_data.extend_from_slice(object.client_data_hash);
        verification_data.extend_from_slice(credential_id);
        verification_data.extend_from_slice(&credential_key.uncompressed_point());

        verify_with_certificate(leaf, CoseAlgorithm::ES256, &verification_data, sig)
            .map_err(attestation_signature_error)?;

        Ok(AttestationType::Basic)
    }
}

fn is_ca_certificate(cert: &X509Certificate<'_>) -> bool {
    cert.extensions()
        .iter()
        .find(|ext| ext.oid.as_bytes() == oid_registry::OID_X509_EXT_BASIC_CONSTRAINTS.as_bytes())
        .is_some_and(|ext| {
            matches!(ext.parsed_extension(), ParsedExtension::BasicConstraints(bc) if bc.ca)
        })
}
