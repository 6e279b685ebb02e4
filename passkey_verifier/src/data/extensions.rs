//! Extension inputs and outputs.
//!
//! Both the authenticator (CBOR) and client (JSON) containers are split into
//! typed known fields plus an ordered bucket of identifiers this crate does
//! not know. Unknown entries survive a decode/encode cycle untouched.

use std::collections::BTreeSet;

use ciborium::value::{Integer, Value as CborValue};
use serde::{Deserialize, Serialize};

use crate::codec::cbor;
use crate::errors::VerifyError;

const CRED_PROTECT: &str = "credProtect";
const HMAC_SECRET: &str = "hmac-secret";
const UVM: &str = "uvm";

#[derive(Debug, Clone, PartialEq)]
pub enum HmacSecretOutput {
    /// Registration: whether the authenticator created the secret.
    Created(bool),
    /// Authentication: encrypted HMAC output.
    Output(Vec<u8>),
}

/// One `uvm` entry: `[userVerificationMethod, keyProtectionType, matcherProtectionType]`.
pub type UvmEntry = [u32; 3];

/// Extension outputs the authenticator put in authenticator data.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthenticatorExtensions {
    cred_protect: Option<u8>,
    hmac_secret: Option<HmacSecretOutput>,
    uvm: Option<Vec<UvmEntry>>,
    unknown: Vec<(String, CborValue)>,
}

impl AuthenticatorExtensions {
    pub fn from_cbor(value: CborValue) -> Result<Self, VerifyError> {
        let entries = cbor::into_map(value, "Authenticator extensions")?;
        let mut out = Self::default();

        for (key, value) in entries {
            let CborValue::Text(key) = key else {
                return Err(VerifyError::DataConversion(
                    "Authenticator extension identifiers must be text".to_string(),
                ));
            };
            match key.as_str() {
                CRED_PROTECT => {
                    let level = cbor::as_i64(&value, CRED_PROTECT)?;
                    out.cred_protect = Some(u8::try_from(level).map_err(|_| {
                        VerifyError::DataConversion(format!(
                            "credProtect value {level} out of range"
                        ))
                    })?);
                }
                HMAC_SECRET => {
                    out.hmac_secret = Some(match value {
                        CborValue::Bool(b) => HmacSecretOutput::Created(b),
                        CborValue::Bytes(b) => HmacSecretOutput::Output(b),
                        _ => {
                            return Err(VerifyError::DataConversion(
                                "hmac-secret must be a boolean or byte string".to_string(),
                            ));
                        }
                    });
                }
                UVM => out.uvm = Some(decode_uvm(&value)?),
                _ => out.unknown.push((key, value)),
            }
        }
        Ok(out)
    }

    pub fn to_cbor(&self) -> CborValue {
        let mut entries = Vec::new();
        if let Some(level) = self.cred_protect {
            entries.push((text(CRED_PROTECT), CborValue::Integer(Integer::from(level))));
        }
        if let Some(hmac) = &self.hmac_secret {
            let value = match hmac {
                HmacSecretOutput::Created(b) => CborValue::Bool(*b),
                HmacSecretOutput::Output(b) => CborValue::Bytes(b.clone()),
            };
            entries.push((text(HMAC_SECRET), value));
        }
        if let Some(uvm) = &self.uvm {
            let value = uvm
                .iter()
                .map(|entry| {
                    CborValue::Array(
                        entry
                            .iter()
                            .map(|v| CborValue::Integer(Integer::from(*v)))
                            .collect(),
                    )
                })
                .collect();
            entries.push((text(UVM), CborValue::Array(value)));
        }
        for (key, value) in &self.unknown {
            entries.push((text(key), value.clone()));
        }
        CborValue::Map(entries)
    }

    pub fn cred_protect(&self) -> Option<u8> {
        self.cred_protect
    }

    pub fn hmac_secret(&self) -> Option<&HmacSecretOutput> {
        self.hmac_secret.as_ref()
    }

    pub fn uvm(&self) -> Option<&[UvmEntry]> {
        self.uvm.as_deref()
    }

    pub fn unknown(&self) -> &[(String, CborValue)] {
        &self.unknown
    }

    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        if self.cred_protect.is_some() {
            ids.push(CRED_PROTECT);
        }
        if self.hmac_secret.is_some() {
            ids.push(HMAC_SECRET);
        }
        if self.uvm.is_some() {
            ids.push(UVM);
        }
        ids.extend(self.unknown.iter().map(|(k, _)| k.as_str()));
        ids
    }
}

fn decode_uvm(value: &CborValue) -> Result<Vec<UvmEntry>, VerifyError> {
    let CborValue::Array(entries) = value else {
        return Err(VerifyError::DataConversion("uvm must be an array".to_string()));
    };
    entries
        .iter()
        .map(|entry| {
            let CborValue::Array(fields) = entry else {
                return Err(VerifyError::DataConversion(
                    "uvm entry must be an array".to_string(),
                ));
            };
            if fields.len() != 3 {
                return Err(VerifyError::DataConversion(format!(
                    "uvm entry must have 3 elements, got {}",
                    fields.len()
                )));
            }
            let mut out = [0u32; 3];
            for (slot, field) in out.iter_mut().zip(fields) {
                let v = cbor::as_i64(field, UVM)?;
                *slot = u32::try_from(v).map_err(|_| {
                    VerifyError::DataConversion(format!("uvm value {v} out of range"))
                })?;
            }
            Ok(out)
        })
        .collect()
}

fn text(s: &str) -> CborValue {
    CborValue::Text(s.to_string())
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CredentialPropertiesOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rk: Option<bool>,
}

/// Extension inputs the relying party passed to `navigator.credentials`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExtensionInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvm: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_create_secret: Option<bool>,
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, serde_json::Value>,
}

impl ClientExtensionInputs {
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self.unknown.keys().map(String::as_str).collect();
        if self.appid.is_some() {
            ids.insert("appid");
        }
        if self.cred_props.is_some() {
            ids.insert("credProps");
        }
        if self.uvm.is_some() {
            ids.insert("uvm");
        }
        if self.hmac_create_secret.is_some() {
            ids.insert("hmacCreateSecret");
        }
        ids
    }
}

/// `clientExtensionResults` as returned by the browser.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientExtensionOutputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appid: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cred_props: Option<CredentialPropertiesOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uvm: Option<Vec<UvmEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac_create_secret: Option<bool>,
    #[serde(flatten)]
    pub unknown: serde_json::Map<String, serde_json::Value>,
}

impl ClientExtensionOutputs {
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut ids: BTreeSet<&str> = self.unknown.keys().map(String::as_str).collect();
        if self.appid.is_some() {
            ids.insert("appid");
        }
        if self.cred_props.is_some() {
            ids.insert("credProps");
        }
        if self.uvm.is_some() {
            ids.insert("uvm");
        }
        if self.hmac_create_secret.is_some() {
            ids.insert("hmacCreateSecret");
        }
        ids
    }

    /// Every output must answer an input the relying party sent.
    /// `credProps` is exempt since browsers may report it unprompted.
    pub fn check_requested(&self, inputs: &ClientExtensionInputs) -> Result<(), VerifyError> {
        let requested = inputs.identifiers();
        for id in self.identifiers() {
            if id != "credProps" && !requested.contains(id) {
                return Err(VerifyError::UnexpectedExtension(format!(
                    "Client extension output '{id}' was not requested"
                )));
            }
        }
        Ok(())
    }
}
