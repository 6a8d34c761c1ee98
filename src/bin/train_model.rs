use std::io;

use clap::Parser;

use housing_dashboard::config::TrainArgs;
use housing_dashboard::train::train;

/// Trains the house price model and writes it to disk.
#[derive(Parser, Debug)]
#[command(name = "train-model", version, about)]
struct Cli {
    #[command(flatten)]
    train: TrainArgs,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    train(&cli.train, &mut io::stdout().lock())?;
    Ok(())
}
