//! rematch: import fills and rebuild trades
//!
//! Usage:
//!   rematch run --fills fills.json [--store-dir DIR] [--compress]
//!   rematch show --store-dir DIR --account <UUID>
//!   rematch verify --fills fills.json [--workers N]
//!
//! `run` prints every affected account's trades, legs and warnings as JSON.
//! With `--store-dir` both the fill ledger and the trade snapshots persist
//! there, so each run re-matches the account's full fill history. Without
//! it fills and trades live in memory for the duration of the run.
//! Tunables come from the environment (or `.env`): `REMATCH_TIMEOUT_MS`,
//! `REMATCH_MAX_PARALLEL`, `REMATCH_MATCH_WORKERS`. Logging goes to stderr
//! and follows `RUST_LOG`.

mod report;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use persistence::{
    FileFillStore, FileTradeStore, FillStore, MemoryFillStore, MemoryTradeStore, TradeStore,
};
use recompute::{DeterminismVerifier, RecomputeConfig, Recomputer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use types::ids::AccountId;

use crate::report::{print_json, read_fills, RunOutput, VerifyOutput};

#[derive(Parser)]
#[command(name = "rematch")]
#[command(version, about = "Rebuild journal trades from broker fills")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import fills, recompute affected accounts, print their trades
    Run {
        /// JSON array of fills, or `-` for stdin
        #[arg(short, long)]
        fills: PathBuf,

        /// Persist fills and trade snapshots in this directory
        #[arg(long)]
        store_dir: Option<PathBuf>,

        /// zstd-compress snapshots
        #[arg(long, requires = "store_dir")]
        compress: bool,
    },

    /// Print the stored trade set of one account
    Show {
        #[arg(long)]
        store_dir: PathBuf,

        #[arg(long)]
        account: AccountId,
    },

    /// Match fills twice (forward and reversed) and compare fingerprints
    Verify {
        #[arg(short, long)]
        fills: PathBuf,

        /// Also compare against parallel matching with this many workers
        #[arg(long)]
        workers: Option<usize>,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            fills,
            store_dir,
            compress,
        } => run(fills, store_dir, compress, cli.pretty).await,
        Command::Show { store_dir, account } => {
            let store = FileTradeStore::new(store_dir, false)?;
            let set = store
                .load_trades(account)
                .with_context(|| format!("loading trades for {account}"))?;
            print_json(&set, cli.pretty)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { fills, workers } => verify(fills, workers, cli.pretty),
    }
}

async fn run(
    fills: PathBuf,
    store_dir: Option<PathBuf>,
    compress: bool,
    pretty: bool,
) -> Result<ExitCode> {
    let config = RecomputeConfig::from_env().context("reading recompute config")?;
    let fills = read_fills(&fills)?;
    info!(fills = fills.len(), ?config, "Starting import");

    let fill_store: Arc<dyn FillStore> = match &store_dir {
        Some(dir) => Arc::new(FileFillStore::open(dir).context("opening fill ledger")?),
        None => Arc::new(MemoryFillStore::new()),
    };
    let trades: Arc<dyn TradeStore> = match store_dir {
        Some(dir) => Arc::new(FileTradeStore::new(dir, compress)?),
        None => Arc::new(MemoryTradeStore::new()),
    };
    let recomputer = Recomputer::new(fill_store, trades.clone(), config);

    let summary = recomputer.import(fills).await?;
    for w in summary.warnings() {
        warn!(account_id = %w.account_id, "{w}");
    }

    let output = RunOutput::collect(&summary, trades.as_ref())?;
    print_json(&output, pretty)?;

    Ok(if summary.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn verify(fills: PathBuf, workers: Option<usize>, pretty: bool) -> Result<ExitCode> {
    let fills = read_fills(&fills)?;

    let mut reports = vec![DeterminismVerifier::verify_double_match(&fills)?];
    if let Some(n) = workers {
        reports.push(DeterminismVerifier::verify_parallel(&fills, n)?);
    }

    let identical = reports.iter().all(|r| r.is_match());
    let outputs: Vec<VerifyOutput> = reports.into_iter().map(VerifyOutput::from).collect();
    print_json(&outputs, pretty)?;

    Ok(if identical {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
