use std::fmt;
use std::str::FromStr;

use ciborium::value::Value as CborValue;

use crate::codec::cbor;
use crate::errors::VerifyError;

use super::authenticator_data::AuthenticatorData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttestationFormat {
    Packed,
    Tpm,
    AndroidKey,
    AndroidSafetyNet,
    Apple,
    AppleAppAttest,
    FidoU2f,
    None,
}

impl AttestationFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Packed => "packed",
            Self::Tpm => "tpm",
            Self::AndroidKey => "android-key",
            Self::AndroidSafetyNet => "android-safetynet",
            Self::Apple => "apple",
            Self::AppleAppAttest => "apple-appattest",
            Self::FidoU2f => "fido-u2f",
            Self::None => "none",
        }
    }
}

impl FromStr for AttestationFormat {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "packed" => Ok(Self::Packed),
            "tpm" => Ok(Self::Tpm),
            "android-key" => Ok(Self::AndroidKey),
            "android-safetynet" => Ok(Self::AndroidSafetyNet),
            "apple" => Ok(Self::Apple),
            "apple-appattest" => Ok(Self::AppleAppAttest),
            "fido-u2f" => Ok(Self::FidoU2f),
            "none" => Ok(Self::None),
            other => Err(VerifyError::NotImplemented(format!(
                "Attestation format '{other}' is not supported"
            ))),
        }
    }
}

impl fmt::Display for AttestationFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of attestation statement verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttestationType {
    Basic,
    #[serde(rename = "self")]
    SelfAttestation,
    AttCa,
    AnonCa,
    None,
}

impl AttestationType {
    /// Types whose trust rests on a certificate path.
    pub fn requires_trust_path(self) -> bool {
        matches!(self, Self::Basic | Self::AttCa | Self::AnonCa)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedStatement {
    pub alg: Option<i64>,
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
    pub ecdaa_key_id: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TpmStatement {
    pub ver: Option<String>,
    pub alg: Option<i64>,
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
    pub ecdaa_key_id: Option<Vec<u8>>,
    pub cert_info: Option<Vec<u8>>,
    pub pub_area: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidKeyStatement {
    pub alg: Option<i64>,
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidSafetyNetStatement {
    pub ver: Option<String>,
    /// Compact JWS, UTF-8 bytes.
    pub response: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleStatement {
    pub x5c: Option<Vec<Vec<u8>>>,
}

/// App Attest statement. `receipt` is opaque here; the app server redeems
/// it with Apple for fraud metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppleAppAttestStatement {
    pub x5c: Option<Vec<Vec<u8>>>,
    pub receipt: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FidoU2fStatement {
    pub sig: Option<Vec<u8>>,
    pub x5c: Option<Vec<Vec<u8>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoneStatement {
    pub entries: Vec<(CborValue, CborValue)>,
}

/// Format specific `attStmt`, keyed by the `fmt` string.
#[derive(Debug, Clone, PartialEq)]
pub enum AttestationStatement {
    Packed(PackedStatement),
    Tpm(TpmStatement),
    AndroidKey(AndroidKeyStatement),
    AndroidSafetyNet(AndroidSafetyNetStatement),
    Apple(AppleStatement),
    AppleAppAttest(AppleAppAttestStatement),
    FidoU2f(FidoU2fStatement),
    None(NoneStatement),
}

/// Returns a required statement field or a constraint violation naming it.
pub(crate) fn require<'a, T>(
    field: &'a Option<T>,
    name: &str,
    format: AttestationFormat,
) -> Result<&'a T, VerifyError> {
    field.as_ref().ok_or_else(|| {
        VerifyError::ConstraintViolation(format!("{name} is required in {format} attestation"))
    })
}

fn require_x5c(
    x5c: &Option<Vec<Vec<u8>>>,
    format: AttestationFormat,
) -> Result<(), VerifyError> {
    if require(x5c, "x5c", format)?.is_empty() {
        return Err(VerifyError::ConstraintViolation(format!(
            "x5c must not be empty in {format} attestation"
        )));
    }
    Ok(())
}

impl AttestationStatement {
    pub fn decode(
        format: AttestationFormat,
        entries: Vec<(CborValue, CborValue)>,
    ) -> Result<Self, VerifyError> {
        let field = |name: &str| cbor::get_text_key(&entries, name);
        let bytes = |name: &str| -> Result<Option<Vec<u8>>, VerifyError> {
            field(name)
                .map(|v| cbor::as_bytes(v, name).map(<[u8]>::to_vec))
                .transpose()
        };
        let int = |name: &str| -> Result<Option<i64>, VerifyError> {
            field(name).map(|v| cbor::as_i64(v, name)).transpose()
        };
        let text = |name: &str| -> Result<Option<String>, VerifyError> {
            field(name)
                .map(|v| cbor::as_text(v, name).map(str::to_string))
                .transpose()
        };
        let certs = || -> Result<Option<Vec<Vec<u8>>>, VerifyError> {
            field("x5c").map(|v| cbor::as_bytes_array(v, "x5c")).transpose()
        };

        let statement = match format {
            AttestationFormat::Packed => Self::Packed(PackedStatement {
                alg: int("alg")?,
                sig: bytes("sig")?,
                x5c: certs()?,
                ecdaa_key_id: bytes("ecdaaKeyId")?,
            }),
            AttestationFormat::Tpm => Self::Tpm(TpmStatement {
                ver: text("ver")?,
                alg: int("alg")?,
                sig: bytes("sig")?,
                x5c: certs()?,
                ecdaa_key_id: bytes("ecdaaKeyId")?,
                cert_info: bytes("certInfo")?,
                pub_area: bytes("pubArea")?,
            }),
            AttestationFormat::AndroidKey => Self::AndroidKey(AndroidKeyStatement {
                alg: int("alg")?,
                sig: bytes("sig")?,
                x5c: certs()?,
            }),
            AttestationFormat::AndroidSafetyNet => {
                Self::AndroidSafetyNet(AndroidSafetyNetStatement {
                    ver: text("ver")?,
                    response: bytes("response")?,
                })
            }
            AttestationFormat::Apple => Self::Apple(AppleStatement { x5c: certs()? }),
            AttestationFormat::AppleAppAttest => Self::AppleAppAttest(AppleAppAttestStatement {
                x5c: certs()?,
                receipt: bytes("receipt")?,
            }),
            AttestationFormat::FidoU2f => Self::FidoU2f(FidoU2fStatement {
                sig: bytes("sig")?,
                x5c: certs()?,
            }),
            // Kept whole so validation can report a non-empty statement.
            AttestationFormat::None => Self::None(NoneStatement { entries }),
        };
        Ok(statement)
    }

    pub fn format(&self) -> AttestationFormat {
        match self {
            Self::Packed(_) => AttestationFormat::Packed,
            Self::Tpm(_) => AttestationFormat::Tpm,
            Self::AndroidKey(_) => AttestationFormat::AndroidKey,
            Self::AndroidSafetyNet(_) => AttestationFormat::AndroidSafetyNet,
            Self::Apple(_) => AttestationFormat::Apple,
            Self::AppleAppAttest(_) => AttestationFormat::AppleAppAttest,
            Self::FidoU2f(_) => AttestationFormat::FidoU2f,
            Self::None(_) => AttestationFormat::None,
        }
    }

    /// Structural checks that run before any cryptography.
    pub fn validate(&self) -> Result<(), VerifyError> {
        let format = self.format();
        match self {
            Self::Packed(s) => {
                require(&s.alg, "alg", format)?;
                require(&s.sig, "sig", format)?;
                if s.x5c.is_some() && s.ecdaa_key_id.is_some() {
                    return Err(VerifyError::ConstraintViolation(
                        "x5c and ecdaaKeyId must not both be present".to_string(),
                    ));
                }
                if s.x5c.is_some() {
                    require_x5c(&s.x5c, format)?;
                }
            }
            Self::Tpm(s) => {
                require(&s.ver, "ver", format)?;
                require(&s.alg, "alg", format)?;
                require(&s.sig, "sig", format)?;
                require_x5c(&s.x5c, format)?;
                require(&s.cert_info, "certInfo", format)?;
                require(&s.pub_area, "pubArea", format)?;
            }
            Self::AndroidKey(s) => {
                require(&s.alg, "alg", format)?;
                require(&s.sig, "sig", format)?;
                require_x5c(&s.x5c, format)?;
            }
            Self::AndroidSafetyNet(s) => {
                if require(&s.ver, "ver", format)?.is_empty() {
                    return Err(VerifyError::ConstraintViolation(
                        "ver must not be empty in android-safetynet attestation".to_string(),
                    ));
                }
                require(&s.response, "response", format)?;
            }
            Self::Apple(s) => require_x5c(&s.x5c, format)?,
            Self::AppleAppAttest(s) => {
                require_x5c(&s.x5c, format)?;
                require(&s.receipt, "receipt", format)?;
            }
            Self::FidoU2f(s) => {
                require(&s.sig, "sig", format)?;
                require_x5c(&s.x5c, format)?;
                if s.x5c.as_ref().map(Vec::len) != Some(1) {
                    return Err(VerifyError::ConstraintViolation(
                        "fido-u2f attestation requires exactly one certificate".to_string(),
                    ));
                }
            }
            Self::None(s) => {
                if !s.entries.is_empty() {
                    return Err(VerifyError::ConstraintViolation(
                        "none attestation statement must be empty".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Leaf-first certificate path, when the format carries one. For
    /// SafetyNet the path lives in the JWS header and is not returned here.
    pub fn x5c(&self) -> Option<&[Vec<u8>]> {
        match self {
            Self::Packed(s) => s.x5c.as_deref(),
            Self::Tpm(s) => s.x5c.as_deref(),
            Self::AndroidKey(s) => s.x5c.as_deref(),
            Self::Apple(s) => s.x5c.as_deref(),
            Self::AppleAppAttest(s) => s.x5c.as_deref(),
            Self::FidoU2f(s) => s.x5c.as_deref(),
            Self::AndroidSafetyNet(_) | Self::None(_) => None,
        }
    }
}

/// The CBOR `attestationObject` returned by `navigator.credentials.create`.
#[derive(Debug, Clone, PartialEq)]
pub struct AttestationObject {
    authenticator_data: AuthenticatorData,
    authenticator_data_bytes: Vec<u8>,
    statement: AttestationStatement,
}

impl AttestationObject {
    pub fn decode(bytes: &[u8]) -> Result<Self, VerifyError> {
        let entries = cbor::into_map(cbor::decode(bytes)?, "Attestation object")?;

        let fmt = cbor::get_text_key(&entries, "fmt")
            .ok_or_else(|| VerifyError::DataConversion("Missing fmt".to_string()))?;
        let format: AttestationFormat = cbor::as_text(fmt, "fmt")?.parse()?;

        let auth_data = cbor::get_text_key(&entries, "authData")
            .ok_or_else(|| VerifyError::DataConversion("Missing authData".to_string()))?;
        let authenticator_data_bytes = cbor::as_bytes(auth_data, "authData")?.to_vec();

        let att_stmt = cbor::get_text_key(&entries, "attStmt")
            .cloned()
            .ok_or_else(|| VerifyError::DataConversion("Missing attStmt".to_string()))?;
        let att_stmt = cbor::into_map(att_stmt, "attStmt")?;

        tracing::debug!(
            "Attestation object: fmt={}, authData {} bytes",
            format,
            authenticator_data_bytes.len()
        );

        let authenticator_data = AuthenticatorData::parse(&authenticator_data_bytes)?;
        let statement = AttestationStatement::decode(format, att_stmt)?;

        Ok(Self {
            authenticator_data,
            authenticator_data_bytes,
            statement,
        })
    }

    pub fn format(&self) -> AttestationFormat {
        self.statement.format()
    }

    pub fn authenticator_data(&self) -> &AuthenticatorData {
        &self.authenticator_data
    }

    /// Raw authenticator data exactly as signed by the authenticator.
    pub fn authenticator_data_bytes(&self) -> &[u8] {
        &self.authenticator_data_bytes
    }

    pub fn attestation_statement(&self) -> &AttestationStatement {
        &self.statement
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CborValue {
        CborValue::Text(s.to_string())
    }

    fn attestation_object_bytes(fmt: &str, att_stmt: Vec<(CborValue, CborValue)>) -> Vec<u8> {
        let mut auth_data = vec![0u8; 32];
        auth_data.push(0x01);
        auth_data.extend_from_slice(&[0, 0, 0, 1]);
        let value = CborValue::Map(vec![
            (text("fmt"), text(fmt)),
            (text("attStmt"), CborValue::Map(att_stmt)),
            (text("authData"), CborValue::Bytes(auth_data)),
        ]);
        cbor::encode(&value).unwrap()
    }

    #[test]
    fn test_decode_none_attestation_object() {
        let obj = AttestationObject::decode(&attestation_object_bytes("none", vec![])).unwrap();
        assert_eq!(obj.format(), AttestationFormat::None);
        assert_eq!(obj.authenticator_data().sign_count(), 1);
        assert_eq!(obj.authenticator_data_bytes().len(), 37);
        assert!(obj.attestation_statement().validate().is_ok());
    }

    #[test]
    fn test_decode_unknown_format() {
        let result = AttestationObject::decode(&attestation_object_bytes("vendor-x", vec![]));
        assert!(matches!(result, Err(VerifyError::NotImplemented(_))));
    }

    #[test]
    fn test_decode_rejects_surplus_data() {
        let mut bytes = attestation_object_bytes("none", vec![]);
        bytes.push(0xf6);
        assert!(matches!(
            AttestationObject::decode(&bytes),
            Err(VerifyError::DataConversion(_))
        ));
    }

    #[test]
    fn test_decode_missing_auth_data() {
        let value = CborValue::Map(vec![
            (text("fmt"), text("none")),
            (text("attStmt"), CborValue::Map(vec![])),
        ]);
        let result = AttestationObject::decode(&cbor::encode(&value).unwrap());
        if let Err(VerifyError::DataConversion(msg)) = result {
            assert!(msg.contains("Missing authData"));
        } else {
            panic!("Expected VerifyError::DataConversion");
        }
    }

    #[test]
    fn test_tpm_statement_requires_x5c() {
        let statement = AttestationStatement::decode(
            AttestationFormat::Tpm,
            vec![
                (text("ver"), text("2.0")),
                (text("alg"), CborValue::Integer((-257).into())),
                (text("sig"), CborValue::Bytes(vec![1])),
                (text("certInfo"), CborValue::Bytes(vec![1])),
                (text("pubArea"), CborValue::Bytes(vec![1])),
            ],
        )
        .unwrap();
        let result = statement.validate();
        if let Err(VerifyError::ConstraintViolation(msg)) = result {
            assert!(msg.contains("x5c is required in tpm attestation"));
        } else {
            panic!("Expected VerifyError::ConstraintViolation");
        }
    }

    #[test]
    fn test_packed_statement_rejects_x5c_and_ecdaa() {
        let statement = AttestationStatement::Packed(PackedStatement {
            alg: Some(-7),
            sig: Some(vec![1]),
            x5c: Some(vec![vec![1]]),
            ecdaa_key_id: Some(vec![2]),
        });
        assert!(matches!(
            statement.validate(),
            Err(VerifyError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn test_u2f_statement_requires_single_certificate() {
        let statement = AttestationStatement::FidoU2f(FidoU2fStatement {
            sig: Some(vec![1]),
            x5c: Some(vec![vec![1], vec![2]]),
        });
        assert!(statement.validate().is_err());
    }

    #[test]
    fn test_none_statement_must_be_empty() {
        let statement = AttestationStatement::decode(
            AttestationFormat::None,
            vec![(text("sig"), CborValue::Bytes(vec![1]))],
        )
        .unwrap();
        if let AttestationStatement::None(none) = &statement {
            assert_eq!(none.entries.len(), 1);
        } else {
            panic!("Expected none statement");
        }
        assert!(statement.validate().is_err());
    }

    #[test]
    fn test_app_attest_statement_requires_receipt() {
        let statement = AttestationStatement::decode(
            AttestationFormat::AppleAppAttest,
            vec![(
                text("x5c"),
                CborValue::Array(vec![CborValue::Bytes(vec![0x30])]),
            )],
        )
        .unwrap();
        if let Err(VerifyError::ConstraintViolation(msg)) = statement.validate() {
            assert_eq!(msg, "receipt is required in apple-appattest attestation");
        } else {
            panic!("Expected VerifyError::ConstraintViolation");
        }
    }

    #[test]
    fn test_app_attest_statement_rejects_empty_x5c() {
        let statement = AttestationStatement::AppleAppAttest(AppleAppAttestStatement {
            x5c: Some(vec![]),
            receipt: Some(vec![0x01]),
        });
        assert!(matches!(
            statement.validate(),
            Err(VerifyError::ConstraintViolation(_))
        ));

        let statement = AttestationStatement::AppleAppAttest(AppleAppAttestStatement {
            x5c: None,
            receipt: Some(vec![0x01]),
        });
        assert!(statement.validate().is_err());
    }

    #[test]
    fn test_statement_field_type_mismatch() {
        let result = AttestationStatement::decode(
            AttestationFormat::Packed,
            vec![(text("alg"), text("ES256"))],
        );
        assert!(matches!(result, Err(VerifyError::DataConversion(_))));
    }

    #[test]
    fn test_attestation_type_serde() {
        assert_eq!(
            serde_json::to_string(&AttestationType::SelfAttestation).unwrap(),
            "\"self\""
        );
        assert_eq!(serde_json::to_string(&AttestationType::AttCa).unwrap(), "\"attca\"");
    }
}
