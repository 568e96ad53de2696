use std::path::PathBuf;

use aquatrend_common::period::parse_date;
use aquatrend_common::{BackfillRequest, BackfillStage};
use aquatrend_server::config::{AppConfig, LogFormat};
use aquatrend_server::error::AppError;
use aquatrend_server::pipeline::{backfill, seed};
use aquatrend_server::server::{self, AppState};
use aquatrend_server::store::Store;
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "aquatrend-server",
    about = "AquaTrend sensor rollup server",
    version
)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Regenerate historical buckets and reports once, then exit
    Backfill {
        #[arg(long)]
        owner: String,
        /// First date of the hourly stage (YYYY-MM-DD)
        #[arg(long, value_parser = date_arg)]
        from: Option<NaiveDate>,
        /// Last date of the hourly stage (YYYY-MM-DD)
        #[arg(long, value_parser = date_arg)]
        to: Option<NaiveDate>,
        #[arg(long, value_enum, default_value = "all")]
        stage: StageArg,
    },
    /// Write placeholder documents into empty collections
    Seed {
        #[arg(long)]
        owner: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    Hourly,
    Daily,
    Periods,
    All,
}

impl StageArg {
    fn stages(self) -> Vec<BackfillStage> {
        match self {
            Self::Hourly => vec![BackfillStage::Hourly],
            Self::Daily => vec![BackfillStage::Daily],
            Self::Periods => vec![BackfillStage::Periods],
            Self::All => vec![
                BackfillStage::Hourly,
                BackfillStage::Daily,
                BackfillStage::Periods,
            ],
        }
    }
}

fn date_arg(value: &str) -> Result<NaiveDate, String> {
    parse_date(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("Create a config.toml or specify one:");
            eprintln!("  aquatrend-server --config <path>");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    let result = match cli.command {
        None => {
            print_banner();
            run_server(config).await
        }
        Some(Command::Backfill {
            owner,
            from,
            to,
            stage,
        }) => {
            let request = BackfillRequest {
                from,
                to,
                stages: stage.stages(),
            };
            run_backfill(config, owner, request).await
        }
        Some(Command::Seed { owner }) => run_seed(config, owner).await,
    };

    if let Err(e) = result {
        tracing::error!("{e}");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_server(config: AppConfig) -> Result<(), AppError> {
    let store = Store::open(&config.store).await?;
    server::run(config, store).await
}

async fn run_backfill(
    config: AppConfig,
    owner: String,
    request: BackfillRequest,
) -> Result<(), AppError> {
    let store = Store::open(&config.store).await?;
    let state = AppState::new(&store, config)?;

    let summary = backfill::run(&state.ctx, &owner, &request).await?;
    store.persist().await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn run_seed(config: AppConfig, owner: String) -> Result<(), AppError> {
    aquatrend_server::pipeline::paths::validate_owner(&owner)?;
    let store = Store::open(&config.store).await?;
    let state = AppState::new(&store, config)?;

    let report = seed::ensure_seeded(&state.ctx, &owner).await;
    store.persist().await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn print_banner() {
    let cyan = "\x1b[36m";
    let dim = "\x1b[2m";
    let reset = "\x1b[0m";

    eprintln!(
        r#"
{cyan}   ___                  _____                    _ {reset}
{cyan}  / _ \ __ _ _   _  __ |_   _| __ ___ _ __   __| |{reset}
{cyan} | |_| |/ _` | | | |/ _` || || '__/ _ \ '_ \ / _` |{reset}
{cyan} |  _  | (_| | |_| | (_| || || | |  __/ | | | (_| |{reset}
{cyan} |_| |_|\__, |\__,_|\__,_||_||_|  \___|_| |_|\__,_|{reset}
{cyan}           |_|{reset}
{dim}  AquaTrend Server v{version}{reset}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );
}

fn init_tracing(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);

    match config.log.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Text => subscriber.init(),
    }
}
