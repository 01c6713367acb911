// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! qsync CLI entrypoint.
//!
//! `qsync simulate` drives a burst of query updates through the sync engine
//! against an in-memory browser history and reports every navigation the
//! engine issued. `qsync config` reads or writes the persisted sync prefs.
//!
//! # Usage
//! ```text
//! qsync simulate --initial 'b=1' --spacing-ms 10 q=rust page=2 b=
//! qsync config show
//! qsync config init --throttle-ms 120
//! ```

// The CLI is expected to print to stdout.
#![allow(clippy::print_stdout)]

mod simulate;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use qsync_config::{ConfigService, FsConfigStore, SyncPrefs, PREFS_KEY};
use tracing::Level;

#[derive(Parser, Debug)]
#[command(name = "qsync", version, about = "URL query-state sync engine tools")]
struct Cli {
    /// Config directory (defaults to the platform config dir).
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run updates through the engine against an in-memory history.
    Simulate(simulate::SimulateArgs),
    /// Inspect or persist sync prefs.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Print the effective prefs as JSON.
    Show,
    /// Write prefs (defaults plus overrides) to the config store.
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Default flush spacing in milliseconds.
    #[arg(long)]
    throttle_ms: Option<u64>,

    /// Platform floor for the flush spacing in milliseconds.
    #[arg(long)]
    platform_min_throttle_ms: Option<u64>,

    /// Default to pushing history entries instead of replacing.
    #[arg(long)]
    push: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let store = match &cli.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new().context("failed to locate config directory")?,
    };
    let config = ConfigService::new(store);

    match cli.command {
        Commands::Simulate(args) => {
            let prefs: SyncPrefs = config.load_or_default(PREFS_KEY);
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("failed to start runtime")?;
            runtime.block_on(simulate::run(args, &prefs))
        }
        Commands::Config(ConfigCommand::Show) => {
            let prefs: SyncPrefs = config.load_or_default(PREFS_KEY);
            println!("{}", serde_json::to_string_pretty(&prefs)?);
            Ok(())
        }
        Commands::Config(ConfigCommand::Init(args)) => {
            let mut prefs = SyncPrefs::default();
            if let Some(ms) = args.throttle_ms {
                prefs.throttle_ms = ms;
            }
            prefs.platform_min_throttle_ms = args.platform_min_throttle_ms;
            if args.push {
                prefs.history = qsync_core::HistoryMode::Push;
            }
            prefs.validate()?;
            config
                .save(PREFS_KEY, &prefs)
                .context("failed to persist prefs")?;
            println!(
                "wrote {}",
                config.store().base().join(format!("{PREFS_KEY}.json")).display()
            );
            Ok(())
        }
    }
}
