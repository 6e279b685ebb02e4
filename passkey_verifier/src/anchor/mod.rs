//! Trust anchors for attestation certificate paths.
//!
//! Every source implements [`TrustAnchorsResolver`]. Anchors registered under
//! [`Aaguid::NULL`] apply to every authenticator model and are always part of
//! the resolved set.

mod cache;
mod cert_file;
mod composite;
mod memory;
mod pem_bundle;

use std::collections::{BTreeSet, HashMap};

use x509_parser::pem::Pem;

use crate::crypto::parse_certificate;
use crate::data::Aaguid;
use crate::errors::VerifyError;

pub use cert_file::CertFileTrustAnchors;
pub use composite::CompositeTrustAnchors;
pub use memory::InMemoryTrustAnchors;
pub use pem_bundle::PemBundleTrustAnchors;

/// A trusted root (or pinned intermediate) certificate, kept as DER.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrustAnchor {
    der: Vec<u8>,
}

impl TrustAnchor {
    pub fn from_der(der: Vec<u8>) -> Result<Self, VerifyError> {
        parse_certificate(&der)
            .map_err(|e| VerifyError::TrustAnchorLoad(format!("Invalid trust anchor: {e}")))?;
        Ok(Self { der })
    }

    /// Reads every `CERTIFICATE` block of a PEM buffer.
    pub fn from_pem(pem: &[u8]) -> Result<Vec<Self>, VerifyError> {
        let mut anchors = Vec::new();
        for block in Pem::iter_from_buffer(pem) {
            let block = block
                .map_err(|e| VerifyError::TrustAnchorLoad(format!("Invalid PEM data: {e}")))?;
            if block.label != "CERTIFICATE" {
                tracing::debug!("Skipping PEM block labelled {}", block.label);
                continue;
            }
            anchors.push(Self::from_der(block.contents)?);
        }
        if anchors.is_empty() {
            return Err(VerifyError::TrustAnchorLoad(
                "No certificate found in PEM data".to_string(),
            ));
        }
        Ok(anchors)
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }
}

pub type TrustAnchorSet = BTreeSet<TrustAnchor>;

pub type TrustAnchorMap = HashMap<Aaguid, TrustAnchorSet>;

pub trait TrustAnchorsResolver: Send + Sync {
    /// Anchors acceptable for `aaguid`: the null-AAGUID set merged with the
    /// model specific set. Unknown models resolve to the null set alone.
    fn resolve(&self, aaguid: &Aaguid) -> Result<TrustAnchorSet, VerifyError>;
}

pub(crate) fn resolve_from_map(map: &TrustAnchorMap, aaguid: &Aaguid) -> TrustAnchorSet {
    let mut anchors = map.get(&Aaguid::NULL).cloned().unwrap_or_default();
    if !aaguid.is_null() {
        if let Some(specific) = map.get(aaguid) {
            anchors.extend(specific.iter().cloned());
        }
    }
    anchors
}

/// Parses certificate file contents, accepting PEM or raw DER.
pub(crate) fn anchors_from_file_contents(contents: &[u8]) -> Result<Vec<TrustAnchor>, VerifyError> {
    if contents.windows(11).any(|w| w == b"-----BEGIN ") {
        TrustAnchor::from_pem(contents)
    } else {
        Ok(vec![TrustAnchor::from_der(contents.to_vec())?])
    }
}
