use crate::data::Aaguid;
use crate::errors::VerifyError;

use super::{TrustAnchor, TrustAnchorMap, TrustAnchorSet, TrustAnchorsResolver, resolve_from_map};

/// Fixed anchors held in memory. Also the landing point for anchors taken
/// from a metadata service, which hands over a complete map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTrustAnchors {
    map: TrustAnchorMap,
}

impl InMemoryTrustAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, aaguid: Aaguid, anchor: TrustAnchor) {
        self.map.entry(aaguid).or_default().insert(anchor);
    }

    pub fn with_anchor(mut self, aaguid: Aaguid, anchor: TrustAnchor) -> Self {
        self.insert(aaguid, anchor);
        self
    }
}

impl From<TrustAnchorMap> for InMemoryTrustAnchors {
    fn from(map: TrustAnchorMap) -> Self {
        Self { map }
    }
}

impl TrustAnchorsResolver for InMemoryTrustAnchors {
    fn resolve(&self, aaguid: &Aaguid) -> Result<TrustAnchorSet, VerifyError> {
        Ok(resolve_from_map(&self.map, aaguid))
    }
}
