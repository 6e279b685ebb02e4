//! Builders shared by the unit tests: ring signing keys, rcgen certificates
//! and hand assembled authenticator data / attestation objects.

use ciborium::value::Value as CborValue;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, CustomExtension, DistinguishedName, DnType,
    IsCa, KeyPair, PKCS_ECDSA_P256_SHA256,
};
use ring::rand::SystemRandom;
use ring::signature::{self, EcdsaKeyPair, KeyPair as _};

use crate::codec::{CoseAlgorithm, CoseCurve, CoseKey, cbor};
use crate::data::{Aaguid, AttestationObject, AuthenticatorFlags};
use crate::utils::sha256;

pub(crate) const TEST_RP_ID: &str = "example.com";
pub(crate) const TEST_ORIGIN: &str = "https://example.com";

pub(crate) struct TestKey {
    pkcs8: Vec<u8>,
    pair: EcdsaKeyPair,
}

pub(crate) fn generate_ec_key() -> TestKey {
    let rng = SystemRandom::new();
    let pkcs8 = EcdsaKeyPair::generate_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
        .unwrap()
        .as_ref()
        .to_vec();
    let pair =
        EcdsaKeyPair::from_pkcs8(&signature::ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8, &rng).unwrap();
    TestKey { pkcs8, pair }
}

impl TestKey {
    /// ASN.1 DER ECDSA signature, as used by WebAuthn.
    pub(crate) fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.pair
            .sign(&SystemRandom::new(), message)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    /// Fixed-width `r || s` signature, as used by JWS.
    pub(crate) fn sign_fixed(&self, message: &[u8]) -> Vec<u8> {
        let rng = SystemRandom::new();
        let pair =
            EcdsaKeyPair::from_pkcs8(&signature::ECDSA_P256_SHA256_FIXED_SIGNING, &self.pkcs8, &rng)
                .unwrap();
        pair.sign(&rng, message).unwrap().as_ref().to_vec()
    }

    pub(crate) fn public_point(&self) -> &[u8] {
        self.pair.public_key().as_ref()
    }

    pub(crate) fn cose_key(&self) -> CoseKey {
        let point = self.public_point();
        CoseKey::new_ec2(
            Some(CoseAlgorithm::ES256),
            CoseCurve::P256,
            point[1..33].to_vec(),
            point[33..65].to_vec(),
        )
        .unwrap()
    }

    fn rcgen_key_pair(&self) -> KeyPair {
        KeyPair::from_der(&self.pkcs8).unwrap()
    }
}

pub(crate) struct CertSpec<'a> {
    pub subject: Vec<(DnType, &'a str)>,
    pub sans: Vec<String>,
    pub is_ca: bool,
    pub path_len: Option<u8>,
    pub extensions: Vec<(Vec<u64>, Vec<u8>)>,
    pub not_after_year: Option<i32>,
}

impl Default for CertSpec<'_> {
    fn default() -> Self {
        Self {
            subject: vec![(DnType::CommonName, "Test Certificate")],
            sans: vec![],
            is_ca: false,
            path_len: None,
            extensions: vec![],
            not_after_year: None,
        }
    }
}

/// FIDO attestation certificate subject: C, O, OU and CN.
pub(crate) fn fido_subject<'a>() -> Vec<(DnType, &'a str)> {
    vec![
        (DnType::CountryName, "US"),
        (DnType::OrganizationName, "Example Authenticators"),
        (DnType::OrganizationalUnitName, "Authenticator Attestation"),
        (DnType::CommonName, "Example Attestation Leaf"),
    ]
}

/// Issues a certificate for `key`. Without an issuer it is self-signed.
/// Returns the rcgen handle (usable as a later issuer) and the DER.
pub(crate) fn issue_cert(
    key: &TestKey,
    spec: CertSpec<'_>,
    issuer: Option<&Certificate>,
) -> (Certificate, Vec<u8>) {
    let mut params = CertificateParams::new(spec.sans);
    params.alg = &PKCS_ECDSA_P256_SHA256;
    params.key_pair = Some(key.rcgen_key_pair());
    let mut dn = DistinguishedName::new();
    for (ty, value) in spec.subject {
        dn.push(ty, value);
    }
    params.distinguished_name = dn;
    params.is_ca = if spec.is_ca {
        IsCa::Ca(match spec.path_len {
            Some(len) => BasicConstraints::Constrained(len),
            None => BasicConstraints::Unconstrained,
        })
    } else {
        IsCa::ExplicitNoCa
    };
    for (oid, content) in spec.extensions {
        params
            .custom_extensions
            .push(CustomExtension::from_oid_content(&oid, content));
    }
    if let Some(year) = spec.not_after_year {
        params.not_before = rcgen::date_time_ymd(year - 5, 1, 1);
        params.not_after = rcgen::date_time_ymd(year, 1, 1);
    }

    let cert = Certificate::from_params(params).unwrap();
    let der = match issuer {
        Some(issuer) => cert.serialize_der_with_signer(issuer).unwrap(),
        None => cert.serialize_der().unwrap(),
    };
    (cert, der)
}

pub(crate) fn self_signed_cert(key: &TestKey, common_name: &str) -> Vec<u8> {
    let spec = CertSpec {
        subject: vec![(DnType::CommonName, common_name)],
        ..Default::default()
    };
    issue_cert(key, spec, None).1
}

/// DER TLV with a short (single byte) tag.
pub(crate) fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    der_with_tag(&[tag], content)
}

pub(crate) fn der_with_tag(tag: &[u8], content: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else if len <= 0xff {
        out.extend_from_slice(&[0x81, len as u8]);
    } else {
        out.extend_from_slice(&[0x82, (len >> 8) as u8, len as u8]);
    }
    out.extend_from_slice(content);
    out
}

pub(crate) fn aaguid_extension(aaguid: &Aaguid) -> (Vec<u64>, Vec<u8>) {
    (
        vec![1, 3, 6, 1, 4, 1, 45724, 1, 1, 4],
        der(0x04, aaguid.as_bytes()),
    )
}

pub(crate) fn build_auth_data(
    flags: u8,
    sign_count: u32,
    attested: Option<(Aaguid, &[u8], &CoseKey)>,
) -> Vec<u8> {
    build_auth_data_for(TEST_RP_ID, flags, sign_count, attested)
}

/// Authenticator data whose `rpIdHash` is SHA-256 of `rp_id`.
pub(crate) fn build_auth_data_for(
    rp_id: &str,
    flags: u8,
    sign_count: u32,
    attested: Option<(Aaguid, &[u8], &CoseKey)>,
) -> Vec<u8> {
    let mut out = sha256(rp_id.as_bytes()).to_vec();
    let flags = if attested.is_some() {
        flags | AuthenticatorFlags::ATTESTED_CREDENTIAL_DATA
    } else {
        flags
    };
    out.push(flags);
    out.extend_from_slice(&sign_count.to_be_bytes());
    if let Some((aaguid, credential_id, key)) = attested {
        out.extend_from_slice(aaguid.as_bytes());
        out.extend_from_slice(&(credential_id.len() as u16).to_be_bytes());
        out.extend_from_slice(credential_id);
        out.extend_from_slice(&key.encode().unwrap());
    }
    out
}

pub(crate) fn text(s: &str) -> CborValue {
    CborValue::Text(s.to_string())
}

pub(crate) fn attestation_object_bytes(
    fmt: &str,
    auth_data: &[u8],
    att_stmt: Vec<(CborValue, CborValue)>,
) -> Vec<u8> {
    cbor::encode(&CborValue::Map(vec![
        (text("fmt"), text(fmt)),
        (text("attStmt"), CborValue::Map(att_stmt)),
        (text("authData"), CborValue::Bytes(auth_data.to_vec())),
    ]))
    .unwrap()
}

pub(crate) fn attestation_object(
    fmt: &str,
    auth_data: &[u8],
    att_stmt: Vec<(CborValue, CborValue)>,
) -> AttestationObject {
    AttestationObject::decode(&attestation_object_bytes(fmt, auth_data, att_stmt)).unwrap()
}

pub(crate) fn test_client_data_hash() -> [u8; 32] {
    sha256(b"{\"type\":\"webauthn.create\",\"challenge\":\"dGVzdA\"}")
}
