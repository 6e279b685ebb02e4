use std::path::PathBuf;

use crate::data::Aaguid;
use crate::errors::VerifyError;

use super::cache::AnchorCache;
use super::{
    TrustAnchorMap, TrustAnchorSet, TrustAnchorsResolver, anchors_from_file_contents,
    resolve_from_map,
};

/// Certificates read from individual files (DER or PEM). They carry no model
/// information, so all of them are registered under [`Aaguid::NULL`].
pub struct CertFileTrustAnchors {
    paths: Vec<PathBuf>,
    cache: AnchorCache,
}

impl CertFileTrustAnchors {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            cache: AnchorCache::default(),
        }
    }

    /// Drops cached anchors so the next resolve re-reads the files.
    pub fn refresh(&self) -> Result<(), VerifyError> {
        self.cache.invalidate()
    }

    fn load(&self) -> Result<TrustAnchorMap, VerifyError> {
        let mut anchors = TrustAnchorSet::new();
        for path in &self.paths {
            let contents = std::fs::read(path).map_err(|e| {
                VerifyError::TrustAnchorLoad(format!("Failed to read {}: {e}", path.display()))
            })?;
            let loaded = anchors_from_file_contents(&contents).map_err(|e| {
                VerifyError::TrustAnchorLoad(format!("{}: {e}", path.display()))
            })?;
            tracing::debug!("Loaded {} trust anchors from {}", loaded.len(), path.display());
            anchors.extend(loaded);
        }
        let mut map = TrustAnchorMap::new();
        map.insert(Aaguid::NULL, anchors);
        Ok(map)
    }
}

impl TrustAnchorsResolver for CertFileTrustAnchors {
    fn resolve(&self, aaguid: &Aaguid) -> Result<TrustAnchorSet, VerifyError> {
        let map = self.cache.get_or_load(|| self.load())?;
        Ok(resolve_from_map(&map, aaguid))
    }
}
