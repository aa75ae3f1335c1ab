use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use rateplan_common::logging;
use rateplan_engine::{EngineConfig, LedgerReport, Scenario};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "rateplan")]
#[command(about = "Price and score dated records against pluggable rules")]
struct Args {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Generate sample configuration file")]
    gen_config: bool,

    #[arg(long, help = "Dry run mode (validate config and exit)")]
    dry_run: bool,

    #[command(flatten)]
    verbosity: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a ledger scenario and print its report as JSON
    Quote {
        /// Scenario file (TOML)
        scenario: PathBuf,
    },
}

#[derive(Serialize)]
struct QuoteOutput {
    summary: rateplan_engine::aggregator::LedgerSummary,
    rejections: Vec<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.gen_config {
        println!("{}", EngineConfig::generate_example()?);
        return Ok(());
    }

    let config = EngineConfig::load(args.config)?;
    logging::init_logging(&args.verbosity, &config.logging.default_filter)?;

    if args.dry_run {
        info!("Configuration validated successfully (dry-run mode)");
        return Ok(());
    }

    match args.command {
        Some(Command::Quote { scenario }) => {
            info!("Replaying scenario {}", scenario.display());
            let replay = Scenario::from_file(&scenario)?.replay()?;
            let summary = LedgerReport::new(&replay.ledger).summary(config.reports.top_owners)?;
            let output = QuoteOutput {
                summary,
                rejections: replay.rejections,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        None => Args::command().print_help()?,
    }

    Ok(())
}
