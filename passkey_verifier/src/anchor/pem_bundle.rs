use std::path::PathBuf;

use crate::data::Aaguid;
use crate::errors::VerifyError;

use super::cache::AnchorCache;
use super::{TrustAnchor, TrustAnchorMap, TrustAnchorSet, TrustAnchorsResolver, resolve_from_map};

/// A keystore-style bundle: one PEM file holding any number of certificates,
/// optionally scoped to a single authenticator model.
pub struct PemBundleTrustAnchors {
    path: PathBuf,
    aaguid: Aaguid,
    cache: AnchorCache,
}

impl PemBundleTrustAnchors {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aaguid: Aaguid::NULL,
            cache: AnchorCache::default(),
        }
    }

    /// Registers the bundle under `aaguid` instead of the null AAGUID.
    pub fn for_aaguid(mut self, aaguid: Aaguid) -> Self {
        self.aaguid = aaguid;
        self
    }

    pub fn refresh(&self) -> Result<(), VerifyError> {
        self.cache.invalidate()
    }

    fn load(&self) -> Result<TrustAnchorMap, VerifyError> {
        let contents = std::fs::read(&self.path).map_err(|e| {
            VerifyError::TrustAnchorLoad(format!("Failed to read {}: {e}", self.path.display()))
        })?;
        let anchors: TrustAnchorSet = TrustAnchor::from_pem(&contents)?.into_iter().collect();
        tracing::debug!(
            "Loaded {} trust anchors for {} from {}",
            anchors.len(),
            self.aaguid,
            self.path.display()
        );
        let mut map = TrustAnchorMap::new();
        map.insert(self.aaguid, anchors);
        Ok(map)
    }
}

impl TrustAnchorsResolver for PemBundleTrustAnchors {
    fn resolve(&self, aaguid: &Aaguid) -> Result<TrustAnchorSet, VerifyError> {
        let map = self.cache.get_or_load(|| self.load())?;
        Ok(resolve_from_map(&map, aaguid))
    }
}
