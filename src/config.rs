//! Command-line configuration for the server and the trainer.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::dataset::{DatasetSource, DEFAULT_DATA_PATH, DEFAULT_DATA_URL};
use crate::forest::ForestParams;
use crate::model::{ModelSource, DEFAULT_MODEL_PATH, DEFAULT_MODEL_URL};

/// Where the dataset comes from. Shared by both binaries.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Local dataset CSV; fetched from `--data-url` when absent.
    #[arg(long, env = "HOUSING_DATA_PATH", default_value = DEFAULT_DATA_PATH)]
    pub data_path: PathBuf,

    #[arg(long, env = "HOUSING_DATA_URL", default_value = DEFAULT_DATA_URL)]
    pub data_url: String,

    /// Per-attempt timeout for any download, in seconds.
    #[arg(long, env = "HOUSING_DOWNLOAD_TIMEOUT_SECS", default_value_t = 30)]
    pub download_timeout_secs: u64,
}

impl DataArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    pub fn source(&self) -> DatasetSource {
        DatasetSource {
            path: self.data_path.clone(),
            url: self.data_url.clone(),
            timeout: self.timeout(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Address the dashboard listens on.
    #[arg(long, env = "HOUSING_BIND", default_value = "127.0.0.1:8501")]
    pub bind: SocketAddr,

    /// Local model artifact; fetched from `--model-url` when absent.
    #[arg(long, env = "HOUSING_MODEL_PATH", default_value = DEFAULT_MODEL_PATH)]
    pub model_path: PathBuf,

    #[arg(long, env = "HOUSING_MODEL_URL", default_value = DEFAULT_MODEL_URL)]
    pub model_url: String,

    #[command(flatten)]
    pub data: DataArgs,
}

impl ServeArgs {
    pub fn model_source(&self) -> ModelSource {
        ModelSource {
            path: self.model_path.clone(),
            url: self.model_url.clone(),
            timeout: self.data.timeout(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct TrainArgs {
    #[command(flatten)]
    pub data: DataArgs,

    /// Where the fitted model is written.
    #[arg(long, short, default_value = DEFAULT_MODEL_PATH)]
    pub output: PathBuf,

    #[arg(long, default_value_t = 100)]
    pub trees: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Unbounded when omitted.
    #[arg(long)]
    pub max_depth: Option<usize>,

    #[arg(long, default_value_t = 1)]
    pub min_samples_leaf: usize,

    /// Fraction of rows held out for an RMSE/R² report. Off by default, in
    /// which case every row is used for fitting.
    #[arg(long, value_parser = parse_fraction)]
    pub holdout: Option<f64>,
}

impl TrainArgs {
    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_trees: self.trees,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            seed: self.seed,
            ..Default::default()
        }
    }
}

fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(format!("{} is not between 0 and 1", value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Serve {
        #[command(flatten)]
        args: ServeArgs,
    }

    #[derive(Parser)]
    struct Train {
        #[command(flatten)]
        args: TrainArgs,
    }

    #[test]
    fn trainer_defaults() {
        let train = Train::try_parse_from(["train-model"]).unwrap().args;
        let params = train.forest_params();
        assert_eq!(params.n_trees, 100);
        assert_eq!(params.seed, 42);
        assert_eq!(params.max_depth, None);
        assert_eq!(train.output, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(train.holdout, None);
    }

    #[test]
    fn holdout_must_be_a_fraction() {
        assert!(Train::try_parse_from(["train-model", "--holdout", "0.2"]).is_ok());
        assert!(Train::try_parse_from(["train-model", "--holdout", "1.5"]).is_err());
        assert!(Train::try_parse_from(["train-model", "--holdout", "abc"]).is_err());
    }

    #[test]
    fn serve_flags_build_sources() {
        let serve = Serve::try_parse_from([
            "housing-dashboard",
            "--model-path",
            "/tmp/m.bin",
            "--download-timeout-secs",
            "5",
        ])
        .unwrap()
        .args;
        let source = serve.model_source();
        assert_eq!(source.path, PathBuf::from("/tmp/m.bin"));
        assert_eq!(source.timeout, Duration::from_secs(5));
        assert_eq!(serve.data.source().timeout, Duration::from_secs(5));
    }
}
