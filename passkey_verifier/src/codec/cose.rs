//! COSE_Key decoding (RFC 8152 / RFC 8230) for credential public keys.
//!
//! Keys are dispatched on the integer `kty` label into a closed set of
//! variants. Labels a variant does not understand are kept verbatim, in wire
//! order, so a decoded key re-encodes without losing extension data.

use ciborium::value::{Integer, Value as CborValue};

use super::cbor;
use crate::errors::VerifyError;

const LABEL_KTY: i64 = 1;
const LABEL_KID: i64 = 2;
const LABEL_ALG: i64 = 3;
// Key type specific labels share the negative range.
const LABEL_CRV_OR_N_OR_K: i64 = -1;
const LABEL_X_OR_E: i64 = -2;
const LABEL_Y: i64 = -3;

/// COSE algorithm identifiers accepted for credential keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoseAlgorithm {
    ES256,
    ES384,
    ES512,
    EdDSA,
    RS256,
    RS384,
    RS512,
    PS256,
    RS1,
}

impl CoseAlgorithm {
    pub fn from_i64(value: i64) -> Result<Self, VerifyError> {
        match value {
            -7 => Ok(Self::ES256),
            -35 => Ok(Self::ES384),
            -36 => Ok(Self::ES512),
            -8 => Ok(Self::EdDSA),
            -257 => Ok(Self::RS256),
            -258 => Ok(Self::RS384),
            -259 => Ok(Self::RS512),
            -37 => Ok(Self::PS256),
            -65535 => Ok(Self::RS1),
            other => Err(VerifyError::NotImplemented(format!(
                "COSE algorithm {other} is not supported"
            ))),
        }
    }

    pub fn value(self) -> i64 {
        match self {
            Self::ES256 => -7,
            Self::ES384 => -35,
            Self::ES512 => -36,
            Self::EdDSA => -8,
            Self::RS256 => -257,
            Self::RS384 => -258,
            Self::RS512 => -259,
            Self::PS256 => -37,
            Self::RS1 => -65535,
        }
    }

    /// Hash function the signature scheme is built on. `None` for EdDSA,
    /// which hashes internally.
    pub fn digest(self) -> Option<&'static ring::digest::Algorithm> {
        match self {
            Self::ES256 | Self::RS256 | Self::PS256 => Some(&ring::digest::SHA256),
            Self::ES384 | Self::RS384 => Some(&ring::digest::SHA384),
            Self::ES512 | Self::RS512 => Some(&ring::digest::SHA512),
            Self::RS1 => Some(&ring::digest::SHA1_FOR_LEGACY_USE_ONLY),
            Self::EdDSA => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseKeyType {
    Okp,
    Ec2,
    Rsa,
    Symmetric,
}

impl CoseKeyType {
    pub fn value(self) -> i64 {
        match self {
            Self::Okp => 1,
            Self::Ec2 => 2,
            Self::Rsa => 3,
            Self::Symmetric => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoseCurve {
    P256,
    P384,
    P521,
    X25519,
    X448,
    Ed25519,
    Ed448,
}

impl CoseCurve {
    pub fn from_i64(value: i64) -> Result<Self, VerifyError> {
        match value {
            1 => Ok(Self::P256),
            2 => Ok(Self::P384),
            3 => Ok(Self::P521),
            4 => Ok(Self::X25519),
            5 => Ok(Self::X448),
            6 => Ok(Self::Ed25519),
            7 => Ok(Self::Ed448),
            other => Err(VerifyError::NotImplemented(format!(
                "COSE curve {other} is not supported"
            ))),
        }
    }

    pub fn value(self) -> i64 {
        match self {
            Self::P256 => 1,
            Self::P384 => 2,
            Self::P521 => 3,
            Self::X25519 => 4,
            Self::X448 => 5,
            Self::Ed25519 => 6,
            Self::Ed448 => 7,
        }
    }

    /// Byte length of a single affine coordinate.
    pub fn coordinate_len(self) -> usize {
        match self {
            Self::P256 | Self::X25519 | Self::Ed25519 => 32,
            Self::P384 => 48,
            Self::P521 => 66,
            Self::X448 => 56,
            Self::Ed448 => 57,
        }
    }
}

/// Header fields every key type can carry.
#[derive(Debug, Clone, PartialEq, Default)]
struct KeyHeader {
    alg: Option<CoseAlgorithm>,
    kid: Option<Vec<u8>>,
    extra: Vec<(CborValue, CborValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ec2Key {
    header: KeyHeader,
    curve: CoseCurve,
    x: Vec<u8>,
    y: Vec<u8>,
}

impl Ec2Key {
    pub fn curve(&self) -> CoseCurve {
        self.curve
    }

    pub fn x(&self) -> &[u8] {
        &self.x
    }

    pub fn y(&self) -> &[u8] {
        &self.y
    }

    /// SEC1 uncompressed point `0x04 || x || y`.
    pub fn uncompressed_point(&self) -> Vec<u8> {
        let mut point = Vec::with_capacity(1 + self.x.len() + self.y.len());
        point.push(0x04);
        point.extend_from_slice(&self.x);
        point.extend_from_slice(&self.y);
        point
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RsaKey {
    header: KeyHeader,
    n: Vec<u8>,
    e: Vec<u8>,
}

impl RsaKey {
    pub fn n(&self) -> &[u8] {
        &self.n
    }

    pub fn e(&self) -> &[u8] {
        &self.e
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OkpKey {
    header: KeyHeader,
    curve: CoseCurve,
    x: Vec<u8>,
}

impl OkpKey {
    pub fn curve(&self) -> CoseCurve {
        self.curve
    }

    pub fn x(&self) -> &[u8] {
        &self.x
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymmetricKey {
    header: KeyHeader,
    k: Vec<u8>,
}

impl SymmetricKey {
    pub fn k(&self) -> &[u8] {
        &self.k
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoseKey {
    Ec2(Ec2Key),
    Rsa(RsaKey),
    Okp(OkpKey),
    Symmetric(SymmetricKey),
}

impl CoseKey {
    pub fn new_ec2(
        alg: Option<CoseAlgorithm>,
        curve: CoseCurve,
        x: Vec<u8>,
        y: Vec<u8>,
    ) -> Result<Self, VerifyError> {
        if !matches!(curve, CoseCurve::P256 | CoseCurve::P384 | CoseCurve::P521) {
            return Err(VerifyError::ConstraintViolation(format!("{curve:?} is not an EC2 curve")));
        }
        if x.len() != curve.coordinate_len() || y.len() != curve.coordinate_len() {
            return Err(VerifyError::ConstraintViolation(format!(
                "EC2 coordinates must be {} bytes for {curve:?}",
                curve.coordinate_len()
            )));
        }
        Ok(Self::Ec2(Ec2Key {
            header: KeyHeader {
                alg,
                ..Default::default()
            },
            curve,
            x,
            y,
        }))
    }

    pub fn new_rsa(
        alg: Option<CoseAlgorithm>,
        n: Vec<u8>,
        e: Vec<u8>,
    ) -> Result<Self, VerifyError> {
        if n.is_empty() || e.is_empty() {
            return Err(VerifyError::ConstraintViolation(
                "RSA key requires modulus and exponent".to_string(),
            ));
        }
        Ok(Self::Rsa(RsaKey {
            header: KeyHeader {
                alg,
                ..Default::default()
            },
            n,
            e,
        }))
    }

    pub fn new_okp(
        alg: Option<CoseAlgorithm>,
        curve: CoseCurve,
        x: Vec<u8>,
    ) -> Result<Self, VerifyError> {
        if !matches!(
            curve,
            CoseCurve::Ed25519 | CoseCurve::Ed448 | CoseCurve::X25519 | CoseCurve::X448
        ) {
            return Err(VerifyError::ConstraintViolation(format!("{curve:?} is not an OKP curve")));
        }
        if x.len() != curve.coordinate_len() {
            return Err(VerifyError::ConstraintViolation(format!(
                "OKP public key must be {} bytes for {curve:?}",
                curve.coordinate_len()
            )));
        }
        Ok(Self::Okp(OkpKey {
            header: KeyHeader {
                alg,
                ..Default::default()
            },
            curve,
            x,
        }))
    }

    /// Decodes a standalone COSE key. Trailing bytes are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        Self::from_cbor(cbor::decode(bytes)?)
    }

    /// Decodes a COSE key at the start of `bytes`, returning the key and the
    /// number of bytes it occupied.
    pub fn decode_prefix(bytes: &[u8]) -> Result<(Self, usize), VerifyError> {
        let (value, consumed) = cbor::decode_prefix(bytes)?;
        Ok((Self::from_cbor(value)?, consumed))
    }

    pub fn from_cbor(value: CborValue) -> Result<Self, VerifyError> {
        let entries = cbor::into_map(value, "COSE key")?;

        let kty = entries
            .iter()
            .find(|(k, _)| int_label(k) == Some(LABEL_KTY))
            .map(|(_, v)| v)
            .ok_or_else(|| missing("kty"))?;
        let kty = match kty {
            CborValue::Integer(i) => cbor::integer_to_i64(i)?,
            CborValue::Text(t) => {
                return Err(VerifyError::NotImplemented(format!(
                    "COSE key type '{t}' is not supported"
                )));
            }
            _ => {
                return Err(VerifyError::DataConversion(
                    "COSE kty must be an integer".to_string(),
                ));
            }
        };

        let mut header = KeyHeader::default();
        let mut params: Vec<(i64, CborValue)> = Vec::new();
        for (label, value) in entries {
            match int_label(&label) {
                Some(LABEL_KTY) => {}
                Some(LABEL_ALG) => {
                    header.alg = Some(CoseAlgorithm::from_i64(cbor::as_i64(&value, "alg")?)?);
                }
                Some(LABEL_KID) => {
                    header.kid = Some(cbor::as_bytes(&value, "kid")?.to_vec());
                }
                Some(l @ (LABEL_CRV_OR_N_OR_K | LABEL_X_OR_E | LABEL_Y)) => {
                    params.push((l, value));
                }
                _ => header.extra.push((label, value)),
            }
        }

        let mut take = |label: i64| -> Option<CborValue> {
            params
                .iter()
                .position(|(l, _)| *l == label)
                .map(|idx| params.remove(idx).1)
        };

        let key = match kty {
            2 => {
                let crv = take(LABEL_CRV_OR_N_OR_K).ok_or_else(|| missing("crv"))?;
                let curve = CoseCurve::from_i64(cbor::as_i64(&crv, "crv")?)?;
                let x = take(LABEL_X_OR_E).ok_or_else(|| missing("x"))?;
                let y = take(LABEL_Y).ok_or_else(|| missing("y"))?;
                if let CborValue::Bool(_) = y {
                    return Err(VerifyError::NotImplemented(
                        "Compressed EC2 points are not supported".to_string(),
                    ));
                }
                let key = Self::new_ec2(
                    header.alg,
                    curve,
                    cbor::as_bytes(&x, "x")?.to_vec(),
                    cbor::as_bytes(&y, "y")?.to_vec(),
                )?;
                key.with_header(header)
            }
            3 => {
                let n = take(LABEL_CRV_OR_N_OR_K).ok_or_else(|| missing("n"))?;
                let e = take(LABEL_X_OR_E).ok_or_else(|| missing("e"))?;
                let key = Self::new_rsa(
                    header.alg,
                    cbor::as_bytes(&n, "n")?.to_vec(),
                    cbor::as_bytes(&e, "e")?.to_vec(),
                )?;
                key.with_header(header)
            }
            1 => {
                let crv = take(LABEL_CRV_OR_N_OR_K).ok_or_else(|| missing("crv"))?;
                let curve = CoseCurve::from_i64(cbor::as_i64(&crv, "crv")?)?;
                let x = take(LABEL_X_OR_E).ok_or_else(|| missing("x"))?;
                let key = Self::new_okp(header.alg, curve, cbor::as_bytes(&x, "x")?.to_vec())?;
                key.with_header(header)
            }
            4 => {
                let k = take(LABEL_CRV_OR_N_OR_K).ok_or_else(|| missing("k"))?;
                Self::Symmetric(SymmetricKey {
                    header: KeyHeader::default(),
                    k: cbor::as_bytes(&k, "k")?.to_vec(),
                })
                .with_header(header)
            }
            other => {
                return Err(VerifyError::NotImplemented(format!(
                    "COSE key type {other} is not supported"
                )));
            }
        };

        // Negative labels the key type does not define are kept like any
        // other unknown parameter.
        let mut key = key;
        let leftover: Vec<(CborValue, CborValue)> = params
            .into_iter()
            .map(|(l, v)| (CborValue::Integer(Integer::from(l)), v))
            .collect();
        key.header_mut().extra.extend(leftover);
        Ok(key)
    }

    pub fn to_cbor(&self) -> CborValue {
        let header = self.header();
        // kty, kid, alg, then key parameters: ascending canonical label order.
        let mut entries = vec![(int(LABEL_KTY), int(self.key_type().value()))];
        if let Some(kid) = &header.kid {
            entries.push((int(LABEL_KID), CborValue::Bytes(kid.clone())));
        }
        if let Some(alg) = header.alg {
            entries.push((int(LABEL_ALG), int(alg.value())));
        }
        match self {
            Self::Ec2(k) => {
                entries.push((int(LABEL_CRV_OR_N_OR_K), int(k.curve.value())));
                entries.push((int(LABEL_X_OR_E), CborValue::Bytes(k.x.clone())));
                entries.push((int(LABEL_Y), CborValue::Bytes(k.y.clone())));
            }
            Self::Rsa(k) => {
                entries.push((int(LABEL_CRV_OR_N_OR_K), CborValue::Bytes(k.n.clone())));
                entries.push((int(LABEL_X_OR_E), CborValue::Bytes(k.e.clone())));
            }
            Self::Okp(k) => {
                entries.push((int(LABEL_CRV_OR_N_OR_K), int(k.curve.value())));
                entries.push((int(LABEL_X_OR_E), CborValue::Bytes(k.x.clone())));
            }
            Self::Symmetric(k) => {
                entries.push((int(LABEL_CRV_OR_N_OR_K), CborValue::Bytes(k.k.clone())));
            }
        }
        entries.extend(header.extra.iter().cloned());
        CborValue::Map(entries)
    }

    pub fn encode(&self) -> Result<Vec<u8>, VerifyError> {
        cbor::encode(&self.to_cbor())
    }

    pub fn key_type(&self) -> CoseKeyType {
        match self {
            Self::Ec2(_) => CoseKeyType::Ec2,
            Self::Rsa(_) => CoseKeyType::Rsa,
            Self::Okp(_) => CoseKeyType::Okp,
            Self::Symmetric(_) => CoseKeyType::Symmetric,
        }
    }

    pub fn algorithm(&self) -> Option<CoseAlgorithm> {
        self.header().alg
    }

    pub fn kid(&self) -> Option<&[u8]> {
        self.header().kid.as_deref()
    }

    /// Parameters this crate does not interpret, in wire order.
    pub fn extra_fields(&self) -> &[(CborValue, CborValue)] {
        &self.header().extra
    }

    /// Compares key material only. `alg`, `kid` and unknown parameters are
    /// ignored, so a key extracted from a certificate can be compared with a
    /// credential key.
    pub fn same_public_key(&self, other: &CoseKey) -> bool {
        match (self, other) {
            (Self::Ec2(a), Self::Ec2(b)) => a.curve == b.curve && a.x == b.x && a.y == b.y,
            (Self::Rsa(a), Self::Rsa(b)) => {
                strip_leading_zeros(&a.n) == strip_leading_zeros(&b.n)
                    && strip_leading_zeros(&a.e) == strip_leading_zeros(&b.e)
            }
            (Self::Okp(a), Self::Okp(b)) => a.curve == b.curve && a.x == b.x,
            _ => false,
        }
    }

    fn header(&self) -> &KeyHeader {
        match self {
            Self::Ec2(k) => &k.header,
            Self::Rsa(k) => &k.header,
            Self::Okp(k) => &k.header,
            Self::Symmetric(k) => &k.header,
        }
    }

    fn header_mut(&mut self) -> &mut KeyHeader {
        match self {
            Self::Ec2(k) => &mut k.header,
            Self::Rsa(k) => &mut k.header,
            Self::Okp(k) => &mut k.header,
            Self::Symmetric(k) => &mut k.header,
        }
    }

    fn with_header(mut self, header: KeyHeader) -> Self {
        *self.header_mut() = header;
        self
    }
}

pub(crate) fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn int_label(value: &CborValue) -> Option<i64> {
    match value {
        CborValue::Integer(i) => i64::try_from(*i).ok(),
        _ => None,
    }
}

fn int(value: i64) -> CborValue {
    CborValue::Integer(Integer::from(value))
}

fn missing(field: &str) -> VerifyError {
    VerifyError::DataConversion(format!("COSE key is missing {field}"))
}
