use std::sync::Arc;

use crate::data::Aaguid;
use crate::errors::VerifyError;

use super::{TrustAnchorSet, TrustAnchorsResolver};

/// Union of several sources. A failing source fails the whole lookup.
#[derive(Clone, Default)]
pub struct CompositeTrustAnchors {
    sources: Vec<Arc<dyn TrustAnchorsResolver>>,
}

impl CompositeTrustAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: Arc<dyn TrustAnchorsResolver>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl TrustAnchorsResolver for CompositeTrustAnchors {
    fn resolve(&self, aaguid: &Aaguid) -> Result<TrustAnchorSet, VerifyError> {
        let mut anchors = TrustAnchorSet::new();
        for source in &self.sources {
            anchors.extend(source.resolve(aaguid)?);
        }
        Ok(anchors)
    }
}
