//! The trained price model: on-disk artifact and the serving-side cache.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::download::{ensure_local_copy, DEFAULT_DOWNLOAD_TIMEOUT};
use crate::error::ModelError;
use crate::features::{HousingFeatures, FEATURE_NAMES};
use crate::forest::{ForestParams, RandomForest};

pub const DEFAULT_MODEL_PATH: &str = "model.bin";

pub const DEFAULT_MODEL_URL: &str =
    "https://drive.google.com/uc?export=download&id=1iLICa05xza_8FbmSGnWtmIzZO8_Yv9bz";

/// Bumped whenever the artifact layout changes incompatibly.
pub const ARTIFACT_VERSION: u32 = 1;

/// Anything that turns one feature vector into a price estimate, in units
/// of $100,000.
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &HousingFeatures) -> f64;
}

/// The serialized form of a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    /// Feature names in the order the forest was fitted on.
    pub feature_names: Vec<String>,
    pub params: ForestParams,
    pub forest: RandomForest,
}

impl ModelArtifact {
    pub fn new(forest: RandomForest, params: ForestParams) -> Self {
        Self {
            version: ARTIFACT_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            params,
            forest,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Decodes an artifact and checks it was trained on this schema.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        let artifact: Self = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
        if artifact.version != ARTIFACT_VERSION {
            return Err(format!(
                "artifact version {} is not supported (expected {})",
                artifact.version, ARTIFACT_VERSION
            ));
        }
        if artifact.feature_names != FEATURE_NAMES {
            return Err(format!(
                "trained on features {:?}, expected {:?}",
                artifact.feature_names, FEATURE_NAMES
            ));
        }
        if artifact.forest.n_features() != FEATURE_NAMES.len() {
            return Err(format!(
                "forest expects {} features, expected {}",
                artifact.forest.n_features(),
                FEATURE_NAMES.len()
            ));
        }
        artifact.forest.validate()?;
        Ok(artifact)
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let bytes = self.to_bytes().map_err(|e| ModelError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ModelError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, bytes).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let bytes = fs::read(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes).map_err(|reason| ModelError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl Regressor for ModelArtifact {
    fn predict(&self, features: &HousingFeatures) -> f64 {
        self.forest.predict(&features.to_array())
    }
}

/// Local path of the model file and the URL used when it is absent.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub path: PathBuf,
    pub url: String,
    pub timeout: Duration,
}

impl Default for ModelSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_MODEL_PATH),
            url: DEFAULT_MODEL_URL.to_string(),
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

impl ModelSource {
    /// Fetches the file if it is missing, then decodes it.
    pub fn load(&self) -> Result<ModelArtifact, ModelError> {
        if ensure_local_copy(&self.path, &self.url, self.timeout)? {
            info!("model file saved to {}", self.path.display());
        }
        ModelArtifact::load(&self.path)
    }
}

/// How long a failed acquisition is reported from cache before the next
/// request is allowed to try the disk and network again.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(60);

enum Slot {
    Empty,
    Ready(Arc<dyn Regressor>),
    Failed { at: Instant, reason: String },
}

/// Process-wide handle to the serving model.
///
/// The first successful [`ModelStore::acquire`] loads the model, fetching
/// the file first if needed; later calls share the cached handle. A failure
/// is remembered for the backoff window and returned as
/// [`ModelError::Unavailable`] without touching the network again; the
/// first call after the window retries. Callers are serialized on an
/// internal lock so that concurrent first requests perform a single
/// download.
pub struct ModelStore {
    source: ModelSource,
    backoff: Duration,
    slot: Mutex<Slot>,
}

impl ModelStore {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            backoff: DEFAULT_RETRY_BACKOFF,
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// A store serving `model` directly, with no file behind it.
    pub fn with_model(model: Arc<dyn Regressor>) -> Self {
        Self {
            source: ModelSource::default(),
            backoff: DEFAULT_RETRY_BACKOFF,
            slot: Mutex::new(Slot::Ready(model)),
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn acquire(&self) -> Result<Arc<dyn Regressor>, ModelError> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Ready(model) => return Ok(Arc::clone(model)),
            Slot::Failed { at, reason } => {
                let elapsed = at.elapsed();
                if elapsed < self.backoff {
                    return Err(ModelError::Unavailable {
                        reason: reason.clone(),
                        retry_in: self.backoff - elapsed,
                    });
                }
            }
            Slot::Empty => {}
        }

        match self.source.load() {
            Ok(artifact) => {
                info!(
                    "model loaded from {} ({} trees)",
                    self.source.path.display(),
                    artifact.forest.trees().len()
                );
                let model: Arc<dyn Regressor> = Arc::new(artifact);
                *slot = Slot::Ready(Arc::clone(&model));
                Ok(model)
            }
            Err(e) => {
                warn!(
                    "model unavailable, next attempt in {}s: {}",
                    self.backoff.as_secs(),
                    e
                );
                *slot = Slot::Failed {
                    at: Instant::now(),
                    reason: e.to_string(),
                };
                Err(e)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(*self.slot.lock(), Slot::Ready(_))
    }

    /// Forgets the cached model or failure; the next acquisition reloads.
    pub fn reset(&self) {
        *self.slot.lock() = Slot::Empty;
    }
}
