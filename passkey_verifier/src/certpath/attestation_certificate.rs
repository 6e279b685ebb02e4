use x509_parser::der_parser::der::parse_der;
use x509_parser::prelude::*;

use crate::data::Aaguid;
use crate::errors::VerifyError;

// id-fido-gen-ce-aaguid
const OID_FIDO_GEN_CE_AAGUID: &str = "1.3.6.1.4.1.45724.1.1.4";

/// Leaf certificate of an attestation path, with the checks WebAuthn puts
/// on top of generic path validation.
pub struct AttestationCertificate<'a> {
    cert: X509Certificate<'a>,
}

impl<'a> AttestationCertificate<'a> {
    pub fn from_der(der: &'a [u8]) -> Result<Self, VerifyError> {
        let (_, cert) = X509Certificate::from_der(der).map_err(|e| {
            VerifyError::Certificate(format!("Failed to parse attestation certificate: {e}"))
        })?;
        Ok(Self { cert })
    }

    pub fn inner(&self) -> &X509Certificate<'a> {
        &self.cert
    }

    /// Version 3 with a subject carrying C, O, OU and CN.
    pub fn validate(&self) -> Result<(), VerifyError> {
        self.require_v3()?;
        let subject = self.cert.subject();
        if self.country().is_none() {
            return Err(VerifyError::Certificate(
                "Attestation certificate subject must contain C".to_string(),
            ));
        }
        if self.organization().is_none() {
            return Err(VerifyError::Certificate(
                "Attestation certificate subject must contain O".to_string(),
            ));
        }
        if self.organizational_unit().is_none() {
            return Err(VerifyError::Certificate(
                "Attestation certificate subject must contain OU".to_string(),
            ));
        }
        if self.common_name().is_none() {
            return Err(VerifyError::Certificate(
                "Attestation certificate subject must contain CN".to_string(),
            ));
        }
        tracing::debug!("Attestation certificate subject: {}", subject);
        Ok(())
    }

    pub fn require_v3(&self) -> Result<(), VerifyError> {
        if self.cert.version() != X509Version::V3 {
            return Err(VerifyError::Certificate(format!(
                "Attestation certificate must be version 3, got version {}",
                self.cert.version().0 + 1
            )));
        }
        Ok(())
    }

    pub fn require_not_ca(&self) -> Result<(), VerifyError> {
        if self.is_ca()? {
            return Err(VerifyError::Certificate(
                "Attestation certificate must not be a CA certificate".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_ca(&self) -> Result<bool, VerifyError> {
        let constraints = self.cert.basic_constraints().map_err(|e| {
            VerifyError::Certificate(format!("Invalid basic constraints extension: {e}"))
        })?;
        Ok(constraints.is_some_and(|bc| bc.value.ca))
    }

    pub fn country(&self) -> Option<&str> {
        first_attr(self.cert.subject().iter_country())
    }

    pub fn organization(&self) -> Option<&str> {
        first_attr(self.cert.subject().iter_organization())
    }

    pub fn organizational_unit(&self) -> Option<&str> {
        first_attr(self.cert.subject().iter_organizational_unit())
    }

    pub fn common_name(&self) -> Option<&str> {
        first_attr(self.cert.subject().iter_common_name())
    }

    pub fn has_empty_subject(&self) -> bool {
        self.cert.subject().iter_attributes().next().is_none()
    }

    /// Value of a non-standard extension, located by dotted OID.
    pub fn extension_value(&self, oid: &str) -> Option<&'a [u8]> {
        self.cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == oid)
            .map(|ext| ext.value)
    }

    /// AAGUID from the id-fido-gen-ce-aaguid extension, if present.
    pub fn aaguid(&self) -> Result<Option<Aaguid>, VerifyError> {
        let Some(ext) = self
            .cert
            .extensions()
            .iter()
            .find(|ext| ext.oid.to_id_string() == OID_FIDO_GEN_CE_AAGUID)
        else {
            return Ok(None);
        };
        if ext.critical {
            return Err(VerifyError::Certificate(
                "AAGUID extension must not be critical".to_string(),
            ));
        }
        let (_, obj) = parse_der(ext.value).map_err(|e| {
            VerifyError::BadAttestationStatement(format!("Malformed AAGUID extension: {e}"))
        })?;
        let bytes = obj.as_slice().map_err(|e| {
            VerifyError::BadAttestationStatement(format!(
                "AAGUID extension is not an OCTET STRING: {e}"
            ))
        })?;
        Ok(Some(Aaguid::from_slice(bytes).map_err(|e| {
            VerifyError::BadAttestationStatement(format!("Malformed AAGUID extension: {e}"))
        })?))
    }

    /// When the certificate names an AAGUID it must be the one in
    /// authenticator data.
    pub fn check_aaguid(&self, expected: Aaguid) -> Result<(), VerifyError> {
        if let Some(cert_aaguid) = self.aaguid()? {
            tracing::debug!(
                "Certificate AAGUID: {}, authenticator AAGUID: {}",
                cert_aaguid,
                expected
            );
            if cert_aaguid != expected {
                return Err(VerifyError::BadAttestationStatement(
                    "AAGUID mismatch between certificate and authenticator data".to_string(),
                ));
            }
        }
        Ok(())
    }
}

fn first_attr<'b, 'c: 'b>(
    mut iter: impl Iterator<Item = &'b AttributeTypeAndValue<'c>>,
) -> Option<&'b str> {
    iter.next().and_then(|attr| attr.as_str().ok())
}
