//! Offline training: dataset in, model artifact out.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use log::info;

use crate::config::TrainArgs;
use crate::dataset::HousingDataset;
use crate::forest::RandomForest;
use crate::model::ModelArtifact;
use crate::stats::{r2, rmse};

// Steps
// 1. Download the housing CSV to disk if it is not there yet
// 2. Load it into features and target
// 3. Optionally hold out rows and report RMSE / R²
// 4. Fit the random forest on the training rows
// 5. Write the model artifact the dashboard serves

fn evaluate(forest: &RandomForest, test: &HousingDataset) {
    let predicted: Vec<f64> = test
        .feature_rows()
        .iter()
        .map(|row| forest.predict(row))
        .collect();
    info!(
        "holdout of {} rows: rmse {:.4}, r2 {:.4}",
        test.len(),
        rmse(&predicted, test.target()),
        r2(&predicted, test.target())
    );
}

/// Runs one training job and returns the path of the written artifact.
///
/// Writes exactly two status lines to `status`: one before loading the data
/// and one naming the artifact once it is on disk.
pub fn train<W: Write>(args: &TrainArgs, status: &mut W) -> anyhow::Result<PathBuf> {
    let params = args.forest_params();

    writeln!(status, "Starting model training...")?;

    // 1-2. fetch and load
    let source = args.data.source();
    let dataset = source
        .load()
        .with_context(|| format!("failed to load dataset from {}", source.path.display()))?;

    // 3. hold out a test set only when asked to
    let (train, test) = match args.holdout {
        Some(fraction) => {
            let (train, test) = dataset.train_test_split(fraction, params.seed);
            (train, Some(test))
        }
        None => (dataset, None),
    };
    info!(
        "fitting {} trees on {} rows (seed {})",
        params.n_trees,
        train.len(),
        params.seed
    );

    // 4. fit
    let forest = RandomForest::fit(&train.feature_rows(), train.target(), &params)
        .context("failed to fit random forest")?;
    if let Some(test) = test.filter(|t| !t.is_empty()) {
        evaluate(&forest, &test);
    }

    // 5. save
    ModelArtifact::new(forest, params)
        .save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    writeln!(status, "Model trained and saved: {}", args.output.display())?;
    Ok(args.output.clone())
}
