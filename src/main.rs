use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use oxycheck::cli::{Cli, Commands};
use oxycheck::config::app_config::load_config;
use oxycheck::config::logging::init_logging;
use oxycheck::http_probe::prelude::*;
use oxycheck::output::render;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("❌ {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let Commands::Run(args) = &cli.command;

    let app = load_config(cli.config.as_deref(), args).context("invalid configuration")?;
    init_logging(&app.log)?;
    for warning in &app.warnings {
        warn!("{warning}");
    }
    info!(url = %app.check.url, log = ?app.log, "running check");

    let result = run_check(&app.check)
        .await
        .with_context(|| format!("check of {} failed", app.check.url))?;

    println!("{}", render(&result, app.output)?);
    Ok(())
}
