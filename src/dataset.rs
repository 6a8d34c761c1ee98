use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use log::info;
use parking_lot::Mutex;
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::download::ensure_local_copy;
use crate::error::DatasetError;
use crate::features::{FEATURE_NAMES, NUM_FEATURES};

pub const TARGET_NAME: &str = "target";

/// Median house values are stored in units of this many dollars.
pub const TARGET_UNIT: f64 = 100_000.0;

pub const DEFAULT_DATA_PATH: &str = "data/housing.csv";

/// 1990 California census block groups, one row per block group.
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/ageron/handson-ml2/master/datasets/housing/housing.csv";

/// Column names of the raw census file, in the order they are read.
const RAW_COLUMNS: [&str; 9] = [
    "median_income",
    "housing_median_age",
    "total_rooms",
    "total_bedrooms",
    "population",
    "households",
    "latitude",
    "longitude",
    "median_house_value",
];

/// The housing table: eight feature columns plus the target.
#[derive(Debug, Clone, PartialEq)]
pub struct HousingDataset {
    features: Vec<Vec<f64>>,
    target: Vec<f64>,
}

impl HousingDataset {
    /// Builds a dataset from feature columns in [`FEATURE_NAMES`] order.
    pub fn from_columns(
        features: [Vec<f64>; NUM_FEATURES],
        target: Vec<f64>,
    ) -> Result<Self, DatasetError> {
        if target.is_empty() {
            return Err(DatasetError::Empty);
        }
        if let Some(idx) = features.iter().position(|c| c.len() != target.len()) {
            return Err(DatasetError::MissingColumn(FEATURE_NAMES[idx].to_string()));
        }
        Ok(Self {
            features: features.into(),
            target,
        })
    }

    fn from_frame(df: &DataFrame) -> Result<Self, DatasetError> {
        let names = df.get_column_names();
        let derived = FEATURE_NAMES.iter().all(|n| names.contains(n));

        if derived {
            let target_col = ["MedHouseVal", TARGET_NAME]
                .into_iter()
                .find(|n| names.contains(n))
                .ok_or_else(|| DatasetError::MissingColumn("MedHouseVal".to_string()))?;

            let mut features = Vec::with_capacity(NUM_FEATURES);
            for name in FEATURE_NAMES {
                features.push(float_column(df, name)?);
            }
            let features: [Vec<f64>; NUM_FEATURES] = features
                .try_into()
                .map_err(|_| DatasetError::MissingColumn(FEATURE_NAMES[0].to_string()))?;
            return Self::from_columns(features, float_column(df, target_col)?);
        }

        let mut raw = Vec::with_capacity(RAW_COLUMNS.len());
        for name in RAW_COLUMNS {
            raw.push(float_column(df, name)?);
        }
        let [income, age, rooms, bedrooms, population, households, lat, lon, value]: [Vec<f64>; 9] =
            raw.try_into()
                .map_err(|_| DatasetError::MissingColumn(RAW_COLUMNS[0].to_string()))?;

        let per_household = |totals: &[f64]| -> Vec<f64> {
            let mut ratios: Vec<f64> = totals
                .iter()
                .zip(&households)
                .map(|(&t, &h)| if h > 0.0 { t / h } else { f64::NAN })
                .collect();
            impute_mean(&mut ratios);
            ratios
        };

        let features = [
            income,
            age,
            per_household(&rooms),
            per_household(&bedrooms),
            population.clone(),
            per_household(&population),
            lat,
            lon,
        ];
        let target = value.into_iter().map(|v| v / TARGET_UNIT).collect();
        Self::from_columns(features, target)
    }

    pub fn len(&self) -> usize {
        self.target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    /// Every column name, features first, then the target.
    pub fn column_names() -> impl Iterator<Item = &'static str> {
        FEATURE_NAMES.into_iter().chain(std::iter::once(TARGET_NAME))
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        if name == TARGET_NAME {
            return Some(&self.target);
        }
        crate::features::feature_index(name).map(|idx| self.features[idx].as_slice())
    }

    pub fn target(&self) -> &[f64] {
        &self.target
    }

    /// One row in column order, target last.
    pub fn row(&self, idx: usize) -> Vec<f64> {
        self.features
            .iter()
            .map(|c| c[idx])
            .chain(std::iter::once(self.target[idx]))
            .collect()
    }

    /// Feature rows in schema order, ready for fitting.
    pub fn feature_rows(&self) -> Vec<Vec<f64>> {
        (0..self.len())
            .map(|i| self.features.iter().map(|c| c[i]).collect())
            .collect()
    }

    fn take(&self, indices: &[usize]) -> Self {
        Self {
            features: self
                .features
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
            target: indices.iter().map(|&i| self.target[i]).collect(),
        }
    }

    /// Shuffles rows with `seed` and splits off `test_fraction` of them.
    ///
    /// Returns `(train, test)`.
    pub fn train_test_split(&self, test_fraction: f64, seed: u64) -> (Self, Self) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((self.len() as f64) * test_fraction.clamp(0.0, 1.0)).round() as usize;
        let (test_idx, train_idx) = indices.split_at(n_test);
        (self.take(train_idx), self.take(test_idx))
    }
}

fn float_column(df: &DataFrame, name: &str) -> Result<Vec<f64>, DatasetError> {
    let series = df
        .column(name)
        .map_err(|_| DatasetError::MissingColumn(name.to_string()))?
        .cast(&DataType::Float64)?;
    let mut values: Vec<f64> = series
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect();
    impute_mean(&mut values);
    Ok(values)
}

/// Replaces NaN entries with the mean of the remaining values.
fn impute_mean(values: &mut [f64]) {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    let mean = if count > 0 { sum / count as f64 } else { 0.0 };
    for v in values.iter_mut().filter(|v| v.is_nan()) {
        *v = mean;
    }
}

pub fn load_csv_file(path: &Path) -> Result<HousingDataset, DatasetError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    info!(
        "loaded {} rows and {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );

    HousingDataset::from_frame(&df)
}

/// Where the dataset lives and where to fetch it from when it does not.
#[derive(Debug, Clone)]
pub struct DatasetSource {
    pub path: PathBuf,
    pub url: String,
    pub timeout: Duration,
}

impl Default for DatasetSource {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATA_PATH),
            url: DEFAULT_DATA_URL.to_string(),
            timeout: crate::download::DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }
}

impl DatasetSource {
    /// Downloads the CSV if missing, then parses it.
    pub fn load(&self) -> Result<HousingDataset, DatasetError> {
        ensure_local_copy(&self.path, &self.url, self.timeout)?;
        load_csv_file(&self.path)
    }
}

/// Process-wide memoized dataset.
///
/// The first successful [`DatasetStore::get`] parses the file; later calls
/// share the same `Arc` until [`DatasetStore::reset`].
pub struct DatasetStore {
    source: DatasetSource,
    cached: Mutex<Option<Arc<HousingDataset>>>,
}

impl DatasetStore {
    pub fn new(source: DatasetSource) -> Self {
        Self {
            source,
            cached: Mutex::new(None),
        }
    }

    /// A store that already holds `dataset` and never touches disk.
    pub fn preloaded(dataset: HousingDataset) -> Self {
        Self {
            source: DatasetSource::default(),
            cached: Mutex::new(Some(Arc::new(dataset))),
        }
    }

    pub fn get(&self) -> Result<Arc<HousingDataset>, DatasetError> {
        let mut cached = self.cached.lock();
        if let Some(dataset) = cached.as_ref() {
            return Ok(Arc::clone(dataset));
        }
        let dataset = Arc::new(self.source.load()?);
        *cached = Some(Arc::clone(&dataset));
        Ok(dataset)
    }

    pub fn reset(&self) {
        self.cached.lock().take();
    }
}
