//! # Classify the current regime from candle files
//! weathervane classify --symbol ES --data data/candles
//!
//! # Classify both instruments in parallel
//! weathervane classify --symbol all --data data/candles --output pretty
//!
//! # Resolve the front-month contract
//! weathervane contract --symbol NQ

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use weathervane::contracts::{front_month_symbol, Instrument};
use weathervane::data::{Clock, EventWindow, FileCandleSource};
use weathervane::pipeline::RegimePipeline;

#[derive(Parser)]
#[command(name = "weathervane")]
#[command(about = "Market regime classifier for ES/NQ index futures")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify the market regime from candle history files
    Classify {
        /// Instrument to classify (ES, NQ, or all)
        #[arg(short, long)]
        symbol: String,

        /// Directory holding <ROOT>_1m.json and <ROOT>_5m.json files
        #[arg(short, long, default_value = "data/candles")]
        data: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "json")]
        output: OutputFormat,

        /// Classify as of this instant instead of now (RFC 3339)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,

        /// Treat the instant as inside a scheduled-event window
        #[arg(long)]
        event_window: bool,
    },

    /// Print the front-month contract symbol
    Contract {
        /// Instrument to resolve (ES or NQ)
        #[arg(short, long)]
        symbol: String,

        /// Resolve as of this instant instead of now (RFC 3339)
        #[arg(long)]
        as_of: Option<DateTime<Utc>>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

/// System clock unless the run is pinned to a fixed instant.
struct CliClock {
    fixed: Option<DateTime<Utc>>,
}

impl Clock for CliClock {
    fn now(&self) -> DateTime<Utc> {
        self.fixed.unwrap_or_else(Utc::now)
    }
}

/// Event-window awareness supplied as a flag; there is no calendar
/// integration behind the CLI.
struct CliEventWindow {
    active: bool,
}

impl EventWindow for CliEventWindow {
    fn is_event_active(&self, _now: DateTime<Utc>) -> bool {
        self.active
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Commands::Classify {
            symbol,
            data,
            output,
            as_of,
            event_window,
        } => {
            let instruments = parse_instruments(&symbol)?;
            let pipeline = RegimePipeline::new(
                FileCandleSource::new(&data),
                CliClock { fixed: as_of },
                CliEventWindow {
                    active: event_window,
                },
            );

            for result in pipeline.classify_all(&instruments) {
                let report = result?;
                let rendered = match output {
                    OutputFormat::Json => report.to_json()?,
                    OutputFormat::Pretty => report.to_json_pretty()?,
                };
                println!("{rendered}");
            }
        }

        Commands::Contract { symbol, as_of } => {
            let instrument: Instrument = symbol.parse()?;
            let at = as_of.unwrap_or_else(Utc::now);
            println!("{}", front_month_symbol(instrument, at));
        }
    }

    Ok(())
}

fn parse_instruments(arg: &str) -> Result<Vec<Instrument>> {
    if arg.eq_ignore_ascii_case("all") {
        Ok(Instrument::ALL.to_vec())
    } else {
        Ok(vec![arg.parse()?])
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "weathervane=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
}
