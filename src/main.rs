use anyhow::Context;
use clap::Parser;
use log::info;

use housing_dashboard::config::ServeArgs;
use housing_dashboard::{router, AppState, DatasetStore, ModelStore};

/// Serves the California housing dashboard.
#[derive(Parser, Debug)]
#[command(name = "housing-dashboard", version, about)]
struct Cli {
    #[command(flatten)]
    serve: ServeArgs,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    // The model and dataset load on first use, so startup never blocks on a
    // download.
    let state = AppState::new(
        ModelStore::new(cli.serve.model_source()),
        DatasetStore::new(cli.serve.data.source()),
    );

    let listener = tokio::net::TcpListener::bind(cli.serve.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.serve.bind))?;
    info!("dashboard listening on http://{}", cli.serve.bind);

    axum::serve(listener, router(state))
        .await
        .context("server error")?;
    Ok(())
}
