use anyhow::{Context, Result};
use clap::Parser;

use sftpfeed::cli::{Cli, Commands};
use sftpfeed::config::Config;
use sftpfeed::engine::{EngineSettings, SyncEngine};
use sftpfeed::ingest::CommandIngest;
use sftpfeed::observer::LocalObserver;
use sftpfeed::pipeline::ensure_local_dir;
use sftpfeed::remote::SftpConnector;

fn main() -> Result<()> {
    let cli = Cli::parse();
    load_env_file(&cli)?;
    let config = Config::from_env().context("invalid configuration")?;

    if cli.command() == Commands::Config {
        println!("{}", config.pretty_json());
        return Ok(());
    }

    let _log_guard = sftpfeed::logging::init(&config.log_file, cli.verbose)?;
    let ingest = CommandIngest::new(&config.ingest_command).context("invalid INGEST_COMMAND")?;
    let connector = SftpConnector::new(config.remote.clone());
    let mut engine = SyncEngine::new(EngineSettings::from(&config), connector, ingest);

    match cli.command() {
        Commands::Once => {
            let report = engine.run_once().context("sync cycle failed")?;
            let failed = report.batch.failed();
            tracing::info!(
                "Done: {} pending, {} downloaded, {} failed processing",
                report.reconciliation.pending.len(),
                report.batch.downloaded.len(),
                failed
            );
            if failed > 0 {
                anyhow::bail!("{} file(s) failed processing", failed);
            }
            Ok(())
        }
        _ => {
            // the observer needs the directory to exist before the first download creates it
            if let Err(e) = ensure_local_dir(&config.local_dir) {
                tracing::warn!("{}", e);
            }
            let _observer = match LocalObserver::start(&config.local_dir, &config.extension) {
                Ok(o) => Some(o),
                Err(e) => {
                    tracing::warn!("local directory watch disabled: {}", e);
                    None
                }
            };
            engine.run_until(crossbeam_channel::never());
            Ok(())
        }
    }
}

fn load_env_file(cli: &Cli) -> Result<()> {
    match &cli.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("cannot load env file {}", path.display()))?;
        }
        None => {
            // a missing ./.env is fine; variables may come from the service manager
            let _ = dotenvy::dotenv();
        }
    }
    Ok(())
}
