//! Error types for the dashboard library.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while fetching a file over HTTP.
#[derive(Error, Debug)]
pub enum DownloadError {
    /// The request could not be sent or the body could not be read.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-success status.
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    /// Writing the downloaded bytes to disk failed.
    #[error("could not write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reasons the prediction model may be unavailable.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The model file was missing and could not be fetched.
    #[error("model download failed: {0}")]
    Download(#[from] DownloadError),

    /// The model file exists but could not be read.
    #[error("could not read model file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The model file could not be decoded into a usable regressor.
    #[error("model file {path} is not a usable artifact: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    /// An earlier attempt failed and the retry window has not passed yet.
    #[error("{reason} (next attempt in {}s)", .retry_in.as_secs())]
    Unavailable { reason: String, retry_in: Duration },
}

/// Errors raised while loading the housing dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset download failed: {0}")]
    Download(#[from] DownloadError),

    #[error("could not parse dataset: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// Neither the derived nor the raw census schema matched.
    #[error("dataset has no column named {0}")]
    MissingColumn(String),

    #[error("dataset has no rows")]
    Empty,

    #[error("dataset I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while turning user input into a feature vector.
#[derive(Error, Debug, PartialEq)]
pub enum FeatureError {
    #[error("unknown feature {0}")]
    UnknownFeature(String),

    #[error("feature {0} supplied more than once")]
    DuplicateFeature(String),

    #[error("value {value:?} for {feature} is not a number")]
    NotNumeric { feature: String, value: String },
}

/// Errors raised when fitting a forest on malformed training data.
#[derive(Error, Debug, PartialEq)]
pub enum FitError {
    #[error("no training rows")]
    Empty,

    #[error("{rows} feature rows but {targets} targets")]
    LengthMismatch { rows: usize, targets: usize },

    /// A row's width differs from the first row's.
    #[error("row {row} has {actual} features, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("forest needs at least one tree")]
    NoTrees,
}
