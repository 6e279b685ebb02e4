use ring::signature::{self, RsaPublicKeyComponents, UnparsedPublicKey};
use subtle::ConstantTimeEq;
use webpki::EndEntityCert;
use x509_parser::prelude::*;
use x509_parser::public_key::PublicKey;

use crate::codec::cose::strip_leading_zeros;
use crate::codec::{CoseAlgorithm, CoseCurve, CoseKey};
use crate::errors::VerifyError;

const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
const OID_RSA_ENCRYPTION: &str = "1.2.840.113549.1.1.1";
const OID_ED25519: &str = "1.3.101.112";
// Named curves carried in the id-ecPublicKey parameters.
const OID_CURVE_P256: &str = "1.2.840.10045.3.1.7";
const OID_CURVE_P384: &str = "1.3.132.0.34";
const OID_CURVE_P521: &str = "1.3.132.0.35";

pub(crate) fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

pub(crate) fn parse_certificate(der: &[u8]) -> Result<X509Certificate<'_>, VerifyError> {
    let (_, cert) = X509Certificate::from_der(der)
        .map_err(|e| VerifyError::Certificate(format!("Failed to parse X509 certificate: {e}")))?;
    Ok(cert)
}

/// Verifies `signature` over `message` with a credential public key.
pub fn verify_with_cose_key(
    key: &CoseKey,
    alg: CoseAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerifyError> {
    let bad_key = || {
        VerifyError::BadAlgorithm(format!(
            "{alg:?} cannot be used with a {:?} key",
            key.key_type()
        ))
    };

    match key {
        CoseKey::Ec2(ec2) => {
            let ring_alg: &'static signature::EcdsaVerificationAlgorithm =
                match (alg, ec2.curve()) {
                    (CoseAlgorithm::ES256, CoseCurve::P256) => &signature::ECDSA_P256_SHA256_ASN1,
                    (CoseAlgorithm::ES384, CoseCurve::P384) => &signature::ECDSA_P384_SHA384_ASN1,
                    (CoseAlgorithm::ES512, CoseCurve::P521) => {
                        return Err(VerifyError::NotImplemented(
                            "ES512 signatures are not supported".to_string(),
                        ));
                    }
                    _ => return Err(bad_key()),
                };
            UnparsedPublicKey::new(ring_alg, ec2.uncompressed_point())
                .verify(message, signature)
                .map_err(|_| VerifyError::BadSignature(format!("{alg:?} signature is invalid")))
        }
        CoseKey::Rsa(rsa) => {
            let params: &'static signature::RsaParameters = match alg {
                CoseAlgorithm::RS256 => &signature::RSA_PKCS1_2048_8192_SHA256,
                CoseAlgorithm::RS384 => &signature::RSA_PKCS1_2048_8192_SHA384,
                CoseAlgorithm::RS512 => &signature::RSA_PKCS1_2048_8192_SHA512,
                CoseAlgorithm::PS256 => &signature::RSA_PSS_2048_8192_SHA256,
                CoseAlgorithm::RS1 => &signature::RSA_PKCS1_1024_8192_SHA1_FOR_LEGACY_USE_ONLY,
                _ => return Err(bad_key()),
            };
            let components = RsaPublicKeyComponents {
                n: strip_leading_zeros(rsa.n()),
                e: strip_leading_zeros(rsa.e()),
            };
            components
                .verify(params, message, signature)
                .map_err(|_| VerifyError::BadSignature(format!("{alg:?} signature is invalid")))
        }
        CoseKey::Okp(okp) => {
            if alg != CoseAlgorithm::EdDSA || okp.curve() != CoseCurve::Ed25519 {
                return Err(bad_key());
            }
            UnparsedPublicKey::new(&signature::ED25519, okp.x())
                .verify(message, signature)
                .map_err(|_| VerifyError::BadSignature("EdDSA signature is invalid".to_string()))
        }
        CoseKey::Symmetric(_) => Err(bad_key()),
    }
}

fn webpki_algorithm(alg: CoseAlgorithm) -> Option<&'static webpki::SignatureAlgorithm> {
    match alg {
        CoseAlgorithm::ES256 => Some(&webpki::ECDSA_P256_SHA256),
        CoseAlgorithm::ES384 => Some(&webpki::ECDSA_P384_SHA384),
        CoseAlgorithm::RS256 => Some(&webpki::RSA_PKCS1_2048_8192_SHA256),
        CoseAlgorithm::RS384 => Some(&webpki::RSA_PKCS1_2048_8192_SHA384),
        CoseAlgorithm::RS512 => Some(&webpki::RSA_PKCS1_2048_8192_SHA512),
        CoseAlgorithm::PS256 => Some(&webpki::RSA_PSS_2048_8192_SHA256_LEGACY_KEY),
        CoseAlgorithm::EdDSA => Some(&webpki::ED25519),
        CoseAlgorithm::ES512 | CoseAlgorithm::RS1 => None,
    }
}

/// Verifies `signature` over `message` with the public key of a DER
/// certificate.
pub fn verify_with_certificate(
    cert_der: &[u8],
    alg: CoseAlgorithm,
    message: &[u8],
    signature: &[u8],
) -> Result<(), VerifyError> {
    if let Some(webpki_alg) = webpki_algorithm(alg) {
        match EndEntityCert::try_from(cert_der) {
            Ok(cert) => {
                return cert
                    .verify_signature(webpki_alg, message, signature)
                    .map_err(|_| {
                        VerifyError::BadSignature(format!(
                            "{alg:?} attestation signature invalid"
                        ))
                    });
            }
            Err(e) => {
                // webpki refuses some attestation certificates (e.g. odd
                // extensions); the key itself is still usable.
                tracing::warn!(
                    "webpki could not parse attestation certificate ({:?}), using its SubjectPublicKeyInfo",
                    e
                );
            }
        }
    }
    let cert = parse_certificate(cert_der)?;
    let key = public_key_from_certificate(&cert)?;
    verify_with_cose_key(&key, alg, message, signature)
}

/// Converts a certificate's SubjectPublicKeyInfo into a COSE key so it can be
/// compared with a credential key. `alg` is left unset.
pub fn public_key_from_certificate(cert: &X509Certificate<'_>) -> Result<CoseKey, VerifyError> {
    let spki = cert.public_key();
    let key_oid = spki.algorithm.algorithm.to_id_string();
    let key_bits: &[u8] = spki.subject_public_key.data.as_ref();

    match key_oid.as_str() {
        OID_EC_PUBLIC_KEY => {
            let curve_oid = spki
                .algorithm
                .parameters
                .as_ref()
                .and_then(|params| params.as_oid().ok())
                .map(|oid| oid.to_id_string())
                .ok_or_else(|| {
                    VerifyError::Certificate("EC public key does not name its curve".to_string())
                })?;
            let curve = ec_curve_from_oid(&curve_oid)?;
            if key_bits.first() != Some(&0x04) {
                return Err(VerifyError::NotImplemented(
                    "Compressed EC public keys are not supported".to_string(),
                ));
            }
            let coord_len = curve.coordinate_len();
            if key_bits.len() != 1 + 2 * coord_len {
                return Err(VerifyError::Certificate(format!(
                    "EC public key of {} bytes does not fit {curve:?}",
                    key_bits.len()
                )));
            }
            CoseKey::new_ec2(
                None,
                curve,
                key_bits[1..1 + coord_len].to_vec(),
                key_bits[1 + coord_len..].to_vec(),
            )
        }
        OID_RSA_ENCRYPTION => match spki.parsed() {
            Ok(PublicKey::RSA(rsa)) => CoseKey::new_rsa(
                None,
                strip_leading_zeros(rsa.modulus).to_vec(),
                strip_leading_zeros(rsa.exponent).to_vec(),
            ),
            Ok(_) | Err(_) => Err(VerifyError::Certificate(
                "Failed to parse RSA public key".to_string(),
            )),
        },
        OID_ED25519 => CoseKey::new_okp(None, CoseCurve::Ed25519, key_bits.to_vec()),
        other => Err(VerifyError::NotImplemented(format!(
            "Certificate public key algorithm {other} is not supported"
        ))),
    }
}

fn ec_curve_from_oid(oid: &str) -> Result<CoseCurve, VerifyError> {
    match oid {
        OID_CURVE_P256 => Ok(CoseCurve::P256),
        OID_CURVE_P384 => Ok(CoseCurve::P384),
        OID_CURVE_P521 => Ok(CoseCurve::P521),
        other => Err(VerifyError::NotImplemented(format!("EC curve {other} is not supported"))),
    }
}
