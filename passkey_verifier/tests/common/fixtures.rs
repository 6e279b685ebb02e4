//! Software authenticator for driving ceremonies end to end.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ciborium::value::Value as CborValue;
use rcgen::{
    BasicConstraints, Certificate, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair,
    PKCS_ECDSA_P256_SHA256,
};
use ring::digest::{SHA256, digest};
use ring::rand::SystemRandom;
use ring::signature::{ECDSA_P256_SHA256_ASN1_SIGNING, EcdsaKeyPair, KeyPair as _};

use passkey_verifier::{
    AuthenticationParameters, AuthenticationResponse, RegistrationParameters,
    RegistrationResponse, ServerProperty,
};

pub const RP_ID: &str = "example.com";
pub const ORIGIN: &str = "https://example.com";
pub const CHALLENGE: &[u8] = b"integration-challenge-0123456789";

pub const FLAG_UP: u8 = 0x01;
pub const FLAG_UV: u8 = 0x04;
const FLAG_AT: u8 = 0x40;

pub fn b64url(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn sha256(data: &[u8]) -> Vec<u8> {
    digest(&SHA256, data).as_ref().to_vec()
}

pub fn server() -> ServerProperty {
    ServerProperty::new(ORIGIN, RP_ID, CHALLENGE.to_vec())
}

pub fn registration_parameters() -> RegistrationParameters {
    RegistrationParameters::new(server())
}

pub fn authentication_parameters() -> AuthenticationParameters {
    AuthenticationParameters::new(server())
}

pub struct SigningKey {
    pkcs8: Vec<u8>,
    pair: EcdsaKeyPair,
}

impl SigningKey {
    pub fn generate() -> Self {
        let rng = SystemRandom::new();
        let pkcs8 = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .unwrap()
            .as_ref()
            .to_vec();
        let pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &pkcs8, &rng).unwrap();
        Self { pkcs8, pair }
    }

    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.pair
            .sign(&SystemRandom::new(), message)
            .unwrap()
            .as_ref()
            .to_vec()
    }

    /// COSE_Key for ES256, encoded as CBOR.
    pub fn cose_key(&self) -> Vec<u8> {
        let point = self.pair.public_key().as_ref();
        let key = CborValue::Map(vec![
            (CborValue::Integer(1.into()), CborValue::Integer(2.into())),
            (CborValue::Integer(3.into()), CborValue::Integer((-7).into())),
            (CborValue::Integer((-1).into()), CborValue::Integer(1.into())),
            (
                CborValue::Integer((-2).into()),
                CborValue::Bytes(point[1..33].to_vec()),
            ),
            (
                CborValue::Integer((-3).into()),
                CborValue::Bytes(point[33..65].to_vec()),
            ),
        ]);
        cbor(&key)
    }

    fn certificate(&self, subject: &[(DnType, &str)], is_ca: bool) -> Certificate {
        let mut params = CertificateParams::new(vec![]);
        params.alg = &PKCS_ECDSA_P256_SHA256;
        params.key_pair = Some(KeyPair::from_der(&self.pkcs8).unwrap());
        let mut dn = DistinguishedName::new();
        for (ty, value) in subject {
            dn.push(ty.clone(), *value);
        }
        params.distinguished_name = dn;
        params.is_ca = if is_ca {
            IsCa::Ca(BasicConstraints::Unconstrained)
        } else {
            IsCa::ExplicitNoCa
        };
        Certificate::from_params(params).unwrap()
    }
}

/// Root CA plus a FIDO attestation leaf it issued.
pub struct AttestationCa {
    pub root_der: Vec<u8>,
    pub leaf_der: Vec<u8>,
    pub leaf_key: SigningKey,
}

impl AttestationCa {
    pub fn generate() -> Self {
        let root_key = SigningKey::generate();
        let root = root_key.certificate(&[(DnType::CommonName, "Example Attestation Root")], true);
        let root_der = root.serialize_der().unwrap();

        let leaf_key = SigningKey::generate();
        let leaf = leaf_key.certificate(
            &[
                (DnType::CountryName, "US"),
                (DnType::OrganizationName, "Example Authenticators"),
                (DnType::OrganizationalUnitName, "Authenticator Attestation"),
                (DnType::CommonName, "Example Attestation Leaf"),
            ],
            false,
        );
        let leaf_der = leaf.serialize_der_with_signer(&root).unwrap();
        Self {
            root_der,
            leaf_der,
            leaf_key,
        }
    }
}

pub enum Attestation<'a> {
    None,
    PackedSelf,
    PackedFull(&'a AttestationCa),
}

/// A single-credential authenticator with its own signature counter.
pub struct SoftAuthenticator {
    pub credential_id: Vec<u8>,
    pub key: SigningKey,
    pub sign_count: u32,
    pub flags: u8,
}

impl SoftAuthenticator {
    pub fn new(credential_id: &[u8]) -> Self {
        Self {
            credential_id: credential_id.to_vec(),
            key: SigningKey::generate(),
            sign_count: 0,
            flags: FLAG_UP | FLAG_UV,
        }
    }

    pub fn with_sign_count(mut self, sign_count: u32) -> Self {
        self.sign_count = sign_count;
        self
    }

    fn auth_data(&self, attested: bool) -> Vec<u8> {
        let mut out = sha256(RP_ID.as_bytes());
        out.push(if attested { self.flags | FLAG_AT } else { self.flags });
        out.extend_from_slice(&self.sign_count.to_be_bytes());
        if attested {
            out.extend_from_slice(&[0u8; 16]);
            out.extend_from_slice(&(self.credential_id.len() as u16).to_be_bytes());
            out.extend_from_slice(&self.credential_id);
            out.extend_from_slice(&self.key.cose_key());
        }
        out
    }

    pub fn create(&self, attestation: Attestation<'_>, origin: &str) -> RegistrationResponse {
        let client_data = client_data("webauthn.create", CHALLENGE, origin);
        let auth_data = self.auth_data(true);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data));

        let (fmt, att_stmt) = match attestation {
            Attestation::None => ("none", vec![]),
            Attestation::PackedSelf => (
                "packed",
                vec![
                    (text("alg"), CborValue::Integer((-7).into())),
                    (text("sig"), CborValue::Bytes(self.key.sign(&signed))),
                ],
            ),
            Attestation::PackedFull(ca) => (
                "packed",
                vec![
                    (text("alg"), CborValue::Integer((-7).into())),
                    (text("sig"), CborValue::Bytes(ca.leaf_key.sign(&signed))),
                    (
                        text("x5c"),
                        CborValue::Array(vec![CborValue::Bytes(ca.leaf_der.clone())]),
                    ),
                ],
            ),
        };
        let attestation_object = cbor(&CborValue::Map(vec![
            (text("fmt"), text(fmt)),
            (text("attStmt"), CborValue::Map(att_stmt)),
            (text("authData"), CborValue::Bytes(auth_data)),
        ]));

        serde_json::from_value(serde_json::json!({
            "id": b64url(&self.credential_id),
            "rawId": b64url(&self.credential_id),
            "type": "public-key",
            "response": {
                "clientDataJSON": b64url(&client_data),
                "attestationObject": b64url(&attestation_object),
                "transports": ["usb", "nfc"],
            },
            "clientExtensionResults": {},
        }))
        .unwrap()
    }

    /// Produces an assertion, bumping the counter first unless it is zero.
    pub fn get(&mut self, challenge: &[u8], origin: &str) -> AuthenticationResponse {
        if self.sign_count != 0 {
            self.sign_count += 1;
        }
        self.assert_with_current_count(challenge, origin)
    }

    pub fn assert_with_current_count(
        &self,
        challenge: &[u8],
        origin: &str,
    ) -> AuthenticationResponse {
        let client_data = client_data("webauthn.get", challenge, origin);
        let auth_data = self.auth_data(false);
        let mut signed = auth_data.clone();
        signed.extend_from_slice(&sha256(&client_data));
        let signature = self.key.sign(&signed);

        serde_json::from_value(serde_json::json!({
            "id": b64url(&self.credential_id),
            "rawId": b64url(&self.credential_id),
            "type": "public-key",
            "response": {
                "clientDataJSON": b64url(&client_data),
                "authenticatorData": b64url(&auth_data),
                "signature": b64url(&signature),
                "userHandle": b64url(b"user-1234"),
            },
        }))
        .unwrap()
    }
}

pub fn client_data(type_: &str, challenge: &[u8], origin: &str) -> Vec<u8> {
    serde_json::json!({
        "type": type_,
        "challenge": b64url(challenge),
        "origin": origin,
        "crossOrigin": false,
    })
    .to_string()
    .into_bytes()
}

fn text(s: &str) -> CborValue {
    CborValue::Text(s.to_string())
}

fn cbor(value: &CborValue) -> Vec<u8> {
    let mut out = Vec::new();
    ciborium::ser::into_writer(value, &mut out).unwrap();
    out
}
