use serde::{Deserialize, Serialize};

use crate::errors::VerifyError;
use crate::utils::{base64url_decode, base64url_encode, sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientDataType {
    Create,
    Get,
    Other(String),
}

impl ClientDataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Create => "webauthn.create",
            Self::Get => "webauthn.get",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for ClientDataType {
    fn from(value: &str) -> Self {
        match value {
            "webauthn.create" => Self::Create,
            "webauthn.get" => Self::Get,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenBindingStatus {
    Present,
    Supported,
    NotSupported,
}

/// Token binding state the client reported in `clientDataJSON`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBinding {
    status: TokenBindingStatus,
    id: Option<Vec<u8>>,
}

impl TokenBinding {
    pub fn new(status: TokenBindingStatus, id: Option<Vec<u8>>) -> Self {
        Self { status, id }
    }

    /// Builds a token binding from the base64url form used on the wire.
    pub fn from_base64url(status: TokenBindingStatus, id: &str) -> Result<Self, VerifyError> {
        let id = base64url_decode(id)
            .map_err(|e| VerifyError::DataConversion(format!("Invalid token binding id: {e}")))?;
        Ok(Self::new(status, Some(id)))
    }

    pub fn status(&self) -> TokenBindingStatus {
        self.status
    }

    pub fn id(&self) -> Option<&[u8]> {
        self.id.as_deref()
    }

    /// A `present` binding must carry the id the server observed on the TLS
    /// connection. An absent id matches only when the server saw none either.
    /// Other statuses carry no id to compare.
    pub fn check(&self, server_token_binding_id: Option<&[u8]>) -> Result<(), VerifyError> {
        if self.status != TokenBindingStatus::Present {
            return Ok(());
        }
        if self.id.as_deref() == server_token_binding_id {
            return Ok(());
        }
        Err(VerifyError::TokenBinding(
            "Token binding id does not match the server token binding id".to_string(),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct TokenBindingJson {
    status: TokenBindingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientDataJson {
    #[serde(rename = "type")]
    type_: String,
    challenge: String,
    origin: String,
    #[serde(default)]
    cross_origin: Option<bool>,
    #[serde(default)]
    top_origin: Option<String>,
    #[serde(default)]
    token_binding: Option<TokenBindingJson>,
}

/// Parsed `clientDataJSON` together with the exact bytes the authenticator
/// hashed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedClientData {
    client_data_type: ClientDataType,
    challenge: Vec<u8>,
    origin: String,
    cross_origin: Option<bool>,
    top_origin: Option<String>,
    token_binding: Option<TokenBinding>,
    raw: Vec<u8>,
    hash: [u8; 32],
}

impl CollectedClientData {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, VerifyError> {
        let json: ClientDataJson = serde_json::from_slice(raw).map_err(|e| {
            VerifyError::DataConversion(format!("Failed to parse client data JSON: {e}"))
        })?;

        let challenge = base64url_decode(&json.challenge)
            .map_err(|e| VerifyError::DataConversion(format!("Invalid challenge encoding: {e}")))?;

        let token_binding = json
            .token_binding
            .map(|tb| match tb.id {
                Some(id) => TokenBinding::from_base64url(tb.status, &id),
                None => Ok(TokenBinding::new(tb.status, None)),
            })
            .transpose()?;

        Ok(Self {
            client_data_type: ClientDataType::from(json.type_.as_str()),
            challenge,
            origin: json.origin,
            cross_origin: json.cross_origin,
            top_origin: json.top_origin,
            token_binding,
            raw: raw.to_vec(),
            hash: sha256(raw),
        })
    }

    pub fn from_base64url(encoded: &str) -> Result<Self, VerifyError> {
        let raw = base64url_decode(encoded)
            .map_err(|e| VerifyError::DataConversion(format!("Invalid clientDataJSON: {e}")))?;
        Self::from_bytes(&raw)
    }

    pub fn client_data_type(&self) -> &ClientDataType {
        &self.client_data_type
    }

    pub fn challenge(&self) -> &[u8] {
        &self.challenge
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn cross_origin(&self) -> Option<bool> {
        self.cross_origin
    }

    pub fn top_origin(&self) -> Option<&str> {
        self.top_origin.as_deref()
    }

    pub fn token_binding(&self) -> Option<&TokenBinding> {
        self.token_binding.as_ref()
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// SHA-256 of the raw JSON bytes.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }
}

/// Serializes a client data JSON object the way browsers do. Mainly useful
/// for building fixtures.
pub fn client_data_json(
    client_data_type: &ClientDataType,
    challenge: &[u8],
    origin: &str,
    token_binding: Option<&TokenBinding>,
) -> Result<Vec<u8>, VerifyError> {
    let mut json = serde_json::json!({
        "type": client_data_type.as_str(),
        "challenge": base64url_encode(challenge),
        "origin": origin,
        "crossOrigin": false,
    });
    if let Some(tb) = token_binding {
        json["tokenBinding"] = serde_json::to_value(TokenBindingJson {
            status: tb.status,
            id: tb.id.as_deref().map(base64url_encode),
        })
        .map_err(|e| VerifyError::DataConversion(format!("Failed to encode token binding: {e}")))?;
    }
    serde_json::to_vec(&json)
        .map_err(|e| VerifyError::DataConversion(format!("Failed to encode client data: {e}")))
}
