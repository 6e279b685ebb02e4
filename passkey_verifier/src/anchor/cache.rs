use std::sync::{Arc, RwLock};

use super::TrustAnchorMap;
use crate::errors::VerifyError;

/// Lazily loaded anchor map shared by the file backed sources.
///
/// A failed load leaves the cache empty so the next call retries.
#[derive(Default)]
pub(crate) struct AnchorCache {
    state: RwLock<Option<Arc<TrustAnchorMap>>>,
}

impl AnchorCache {
    pub(crate) fn get_or_load(
        &self,
        load: impl FnOnce() -> Result<TrustAnchorMap, VerifyError>,
    ) -> Result<Arc<TrustAnchorMap>, VerifyError> {
        {
            let state = self.state.read().map_err(|_| poisoned())?;
            if let Some(map) = state.as_ref() {
                return Ok(Arc::clone(map));
            }
        }

        let mut state = self.state.write().map_err(|_| poisoned())?;
        // Another thread may have loaded while we waited for the write lock.
        if let Some(map) = state.as_ref() {
            return Ok(Arc::clone(map));
        }
        let map = Arc::new(load()?);
        *state = Some(Arc::clone(&map));
        Ok(map)
    }

    pub(crate) fn invalidate(&self) -> Result<(), VerifyError> {
        *self.state.write().map_err(|_| poisoned())? = None;
        Ok(())
    }
}

fn poisoned() -> VerifyError {
    VerifyError::TrustAnchorLoad("Trust anchor cache lock poisoned".to_string())
}
