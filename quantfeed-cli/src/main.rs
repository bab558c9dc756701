//! quantfeed CLI: query the broker gateway or a local archive from a TOML config.
//!
//! Commands:
//! - `history`: fields by source-native name, printed as JSON
//! - `price`: canonical OHLCV fields, printed as JSON
//! - `instruments`: constituents of an archive index
//! - `backends`: which data backends this build supports

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quantfeed_core::archive::QlibArchive;
use quantfeed_core::data::{capabilities, Backend};
use quantfeed_core::domain::resolve_field;
use quantfeed_core::time::RegularSessions;
use quantfeed_core::{
    ArchiveDataProvider, BrokerDataProvider, FieldToken, Frequency, History, HistoryRequest,
    OneOrMany, PriceDataProvider, PriceField, PriceRequest, QuantfeedConfig, Ticker,
};

#[derive(Parser)]
#[command(name = "quantfeed", about = "quantfeed CLI: look-ahead-safe market data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Source {
    Broker,
    Archive,
}

#[derive(clap::Args)]
struct Query {
    /// Path to the TOML config file.
    #[arg(long)]
    config: PathBuf,

    /// Data source to query.
    #[arg(long, value_enum, default_value_t = Source::Archive)]
    source: Source,

    /// Stock tickers (e.g., SH600000 AAPL).
    tickers: Vec<String>,

    /// Index tickers; the archive expands them to their constituents.
    #[arg(long = "index")]
    indices: Vec<String>,

    /// Comma-separated field names.
    #[arg(long, default_value = "close", value_delimiter = ',')]
    fields: Vec<String>,

    /// Start date (YYYY-MM-DD or "YYYY-MM-DD HH:MM:SS").
    #[arg(long)]
    start: String,

    /// End date. Defaults to now.
    #[arg(long)]
    end: Option<String>,

    /// Bar frequency (e.g., 1d, 1m, 1w). Defaults to the provider's.
    #[arg(long)]
    frequency: Option<String>,

    /// Disable the look-ahead guard.
    #[arg(long, default_value_t = false)]
    look_ahead_bias: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch history by source-native field names.
    History(Query),
    /// Fetch canonical price fields (open, high, low, close, volume).
    Price(Query),
    /// List the members of an archive index.
    Instruments {
        /// Path to the TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Index name (e.g., csi300).
        market: String,
    },
    /// Report the data backends compiled into this build.
    Backends,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::History(query) => run_history(&query),
        Commands::Price(query) => run_price(&query),
        Commands::Instruments { config, market } => run_instruments(&config, &market),
        Commands::Backends => run_backends(),
    }
}

fn run_history(query: &Query) -> Result<()> {
    let provider = build_provider(query)?;
    let fields: Vec<FieldToken> = query.fields.iter().map(|f| FieldToken::from(f.as_str())).collect();

    let mut request = HistoryRequest::new(tickers(query)?, one_or_many(fields), parse_instant(&query.start)?)
        .look_ahead_bias(query.look_ahead_bias);
    if let Some(end) = &query.end {
        request = request.end(parse_instant(end)?);
    }
    if let Some(frequency) = &query.frequency {
        request = request.frequency(parse_frequency(frequency)?);
    }

    print_history(&provider.get_history(&request)?)
}

fn run_price(query: &Query) -> Result<()> {
    let provider = build_provider(query)?;
    let fields = query
        .fields
        .iter()
        .map(|f| resolve_field(&FieldToken::from(f.as_str())))
        .collect::<Result<Vec<PriceField>, _>>()?;

    let mut request = PriceRequest::new(tickers(query)?, one_or_many(fields), parse_instant(&query.start)?)
        .look_ahead_bias(query.look_ahead_bias);
    if let Some(end) = &query.end {
        request = request.end(parse_instant(end)?);
    }
    if let Some(frequency) = &query.frequency {
        request = request.frequency(parse_frequency(frequency)?);
    }

    print_history(&provider.get_price(&request)?)
}

fn run_instruments(config_path: &Path, market: &str) -> Result<()> {
    let config = QuantfeedConfig::from_file(config_path)?;
    let Some(archive) = config.archive else {
        bail!("{} has no [archive] section", config_path.display());
    };

    let archive = QlibArchive::open(archive.resolve_path()?)?;
    let spans = archive.instruments(market)?;
    for span in &spans {
        println!("{}\t{}\t{}", span.symbol, span.start, span.end);
    }
    println!("{} instruments in {market}", spans.len());
    Ok(())
}

fn run_backends() -> Result<()> {
    let caps = capabilities();
    for backend in [Backend::Broker, Backend::Archive] {
        let status = if caps.has(backend) { "available" } else { "not compiled in" };
        println!("{:<8} {status}", backend.feature());
    }
    Ok(())
}

fn build_provider(query: &Query) -> Result<Box<dyn PriceDataProvider>> {
    let config = QuantfeedConfig::from_file(&query.config)
        .with_context(|| format!("loading {}", query.config.display()))?;
    let calendar = Arc::new(RegularSessions::from_times(config.sessions));

    let provider: Box<dyn PriceDataProvider> = match query.source {
        Source::Broker => {
            let Some(broker) = &config.broker else {
                bail!("{} has no [broker] section", query.config.display());
            };
            Box::new(BrokerDataProvider::try_new(broker)?.with_calendar(calendar))
        }
        Source::Archive => {
            let Some(archive) = &config.archive else {
                bail!("{} has no [archive] section", query.config.display());
            };
            Box::new(ArchiveDataProvider::try_new(archive)?.with_calendar(calendar))
        }
    };
    log::info!("using {} provider", provider.name());
    Ok(provider)
}

/// A single ticker stays single so the result is squeezed on that axis.
fn tickers(query: &Query) -> Result<OneOrMany<Ticker>> {
    let tickers: Vec<Ticker> = query
        .tickers
        .iter()
        .map(Ticker::stock)
        .chain(query.indices.iter().map(Ticker::index))
        .collect();
    if tickers.is_empty() {
        bail!("at least one ticker or --index is required");
    }
    Ok(one_or_many(tickers))
}

fn one_or_many<T>(mut items: Vec<T>) -> OneOrMany<T> {
    if items.len() == 1 {
        if let Some(item) = items.pop() {
            return OneOrMany::One(item);
        }
    }
    OneOrMany::Many(items)
}

fn parse_instant(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN)))
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))
}

fn parse_frequency(s: &str) -> Result<Frequency> {
    s.parse::<Frequency>().map_err(anyhow::Error::msg)
}

fn print_history(history: &History) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(history)?);
    Ok(())
}
