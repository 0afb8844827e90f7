//! load-events - loads a SQL script into Embucket and verifies the result.

use embucket_loader::cli::Cli;
use embucket_loader::config::Config;
use embucket_loader::error::{LoaderError, Result};
use embucket_loader::loader::{self, ConsoleProgress, VerifySettings};
use embucket_loader::staging::{LocalStager, Stager};
use embucket_loader::{db, logging, script};
use std::time::Duration;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring .env file: {e}");
        }
    }

    let cli = Cli::parse_args();

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;

    // CLI flags, then the config file, then EMBUCKET_* variables.
    cli.apply_to(&mut config)?;
    config.connection.apply_env_defaults();
    config.validate()?;

    let statements = script::load(&config.loader.script)?;
    info!(
        "Read {} statements from {}",
        statements.len(),
        config.loader.script.display()
    );

    let mut progress = ConsoleProgress::stdout();

    // With staging off, the script reads whatever is already in the data directory.
    if config.staging.enabled {
        let data_file = config.loader.data_file();
        if !data_file.is_file() {
            return Err(LoaderError::input(format!("{} not found", data_file.display())));
        }
        println!("Copying {} to data directory...", data_file.display());
        let staged = LocalStager::from_config(&config.staging).stage(&data_file)?;
        println!(
            "✓ Copied {} to {}{}",
            data_file.display(),
            staged.path.display(),
            if staged.escalated { " (with sudo)" } else { "" }
        );
    }

    let timeout = Duration::from_secs(config.loader.query_timeout_secs);
    let connection = &config.connection;

    loader::load(
        || db::connect(connection, timeout),
        &connection.display_string(),
        &statements,
        VerifySettings {
            target: &config.target,
            sample_limit: config.loader.sample_limit,
        },
        &mut progress,
    )
    .await?;

    Ok(())
}
