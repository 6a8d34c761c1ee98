//! California housing dashboard: dataset exploration and house price
//! prediction served over HTTP, plus the offline trainer that produces the
//! model artifact the prediction view serves.

pub mod charts;
pub mod config;
pub mod dataset;
pub mod download;
pub mod error;
pub mod features;
pub mod forest;
pub mod map;
pub mod model;
pub mod predict;
pub mod server;
pub mod stats;
pub mod train;
pub mod views;

pub use dataset::{DatasetSource, DatasetStore, HousingDataset};
pub use error::{DatasetError, DownloadError, FeatureError, FitError, ModelError};
pub use features::{HousingFeatures, FEATURE_NAMES};
pub use forest::{ForestParams, RandomForest};
pub use model::{ModelArtifact, ModelSource, ModelStore, Regressor};
pub use predict::{format_currency, predict, Prediction};
pub use server::{router, AppState};
