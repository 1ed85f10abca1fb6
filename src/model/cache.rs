//! Process-wide model cache.
//!
//! Keyed by checkpoint path; populated on first use; handles are shared
//! across annotator instances and live until process exit. There is no
//! reload-on-change.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lazy_static::lazy_static;
use parking_lot::Mutex;

use crate::error::{StrideError, StrideResult};

use super::InferenceModel;

/// Shared handle to a loaded model. The inner lock serializes inference.
pub type ModelHandle = Arc<Mutex<InferenceModel>>;

lazy_static! {
    static ref MODEL_CACHE: PathKeyedCache<Mutex<InferenceModel>> = PathKeyedCache::new();
}

/// Load a checkpoint, or fetch the already-loaded session for its path.
pub fn load_model(path: &Path, input_size: u32) -> StrideResult<ModelHandle> {
    MODEL_CACHE.get_or_try_insert(path, || {
        if !path.is_file() {
            return Err(StrideError::Model(format!(
                "checkpoint not found: {}",
                path.display()
            )));
        }
        log::info!("Loading model: {}", path.display());
        Ok(Mutex::new(InferenceModel::load(path, input_size)?))
    })
}

/// Small path-keyed once-cache. Separated from the global so the sharing
/// behavior is testable without loading a real session.
pub(crate) struct PathKeyedCache<T> {
    map: Mutex<HashMap<PathBuf, Arc<T>>>,
}

impl<T> PathKeyedCache<T> {
    pub(crate) fn new() -> Self {
        Self {
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `path`, building it with `load` on the
    /// first request. A failed load caches nothing.
    pub(crate) fn get_or_try_insert<F>(&self, path: &Path, load: F) -> StrideResult<Arc<T>>
    where
        F: FnOnce() -> StrideResult<T>,
    {
        let mut map = self.map.lock();
        if let Some(cached) = map.get(path) {
            return Ok(Arc::clone(cached));
        }
        let value = Arc::new(load()?);
        map.insert(path.to_path_buf(), Arc::clone(&value));
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.map.lock().len()
    }
}
