use std::sync::Arc;

use anyhow::Context;
use clap::ArgMatches;
use log::{info, warn};
use onair_lib::{BroadcastConfig, BroadcastEngine};

use crate::cli;
use crate::logging::LogBuffer;
use crate::server::{self, AppState};

pub fn run(args: &ArgMatches, logs: LogBuffer) -> anyhow::Result<i32> {
    if let Some(("create", create)) = args.subcommand() {
        if create.subcommand_matches("config-json").is_some() {
            println!("{}", BroadcastConfig::default().to_json_pretty());
        }
        return Ok(0);
    }

    let config = cli::settings::resolve(args)?;
    info!("starting onair with {}", config.track_path.display());
    if !config.fx_dir.is_dir() {
        warn!("effects directory {} is missing", config.fx_dir.display());
    }

    let engine = Arc::new(BroadcastEngine::with_sox(config));
    if args.get_flag("autostart") {
        engine.start()?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to build the async runtime")?;
    runtime.block_on(server::serve(AppState { engine, logs }))?;

    Ok(0)
}
