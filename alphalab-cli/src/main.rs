//! AlphaLab CLI — feature, label, train, and inference commands.
//!
//! Commands:
//! - `features` — compute the feature table from CSV inputs and upsert it
//! - `label` — compute forward returns and attach them to existing rows
//! - `train` — walk-forward cross-validated training with artifact export
//! - `infer` — apply a persisted model to one day's feature rows
//!
//! State between commands travels through a store snapshot file (JSON), so
//! `features → label → train → infer` chains across processes.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use alphalab_core::config::PipelineConfig;
use alphalab_core::store::InMemoryStore;
use alphalab_core::text_sentiment::{LexiconScorer, SentimentScorer};
use alphalab_runner::data_loader::CsvMarketData;
use alphalab_runner::inference::run_inference;
use alphalab_runner::model::GbmParams;
use alphalab_runner::train::{train_with_cv, TrainRequest};
use alphalab_runner::{compute_features, compute_labels};

#[derive(Parser)]
#[command(name = "alphalab", about = "AlphaLab CLI — daily return forecasting pipeline")]
struct Cli {
    /// Pipeline config TOML. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot file shared across commands.
    #[arg(long, global = true, default_value = "store.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the feature table from CSV inputs and upsert it into the store.
    Features {
        /// Directory holding prices.csv (required), fundamentals.csv, news.csv.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Symbols to process. Defaults to the configured ticker universe.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Start date (YYYY-MM-DD). Defaults to end minus the configured
        /// feature lookback.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Compute forward-return labels and attach them to existing feature rows.
    Label {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        /// Forward-return horizon in trading days.
        #[arg(long, default_value_t = 1)]
        horizon_days: u32,
    },
    /// Train with expanding-window embargoed cross-validation.
    Train {
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(long)]
        start: Option<String>,

        #[arg(long)]
        end: Option<String>,

        #[arg(long, default_value_t = 5)]
        n_splits: usize,

        #[arg(long, default_value_t = 2)]
        embargo_days: i64,

        #[arg(long, default_value_t = 0.2)]
        test_size: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Directory receiving metrics.json, feature_importances.csv, model.json.
        #[arg(long, default_value = "artifacts/models")]
        output_dir: PathBuf,
    },
    /// Apply a persisted model to one day's feature rows.
    Infer {
        /// Path to a model.json artifact.
        #[arg(long)]
        model: PathBuf,

        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        /// Target date (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        #[arg(long, default_value_t = 1)]
        horizon_days: u32,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let mut store = if cli.store.exists() {
        InMemoryStore::load(&cli.store)
            .with_context(|| format!("loading store snapshot {}", cli.store.display()))?
    } else {
        InMemoryStore::new()
    };

    // One scorer handle for the whole process; readers borrow it, nothing
    // lazily initializes it behind the scenes.
    let scorer: Arc<dyn SentimentScorer> = Arc::new(LexiconScorer::default());

    match cli.command {
        Commands::Features {
            data_dir,
            symbols,
            start,
            end,
        } => {
            let end = parse_date_or_today(end.as_deref())?;
            let start = match start.as_deref() {
                Some(s) => parse_date(s)?,
                None => end - chrono::Duration::days(config.feature_lookback_days),
            };

            let source = CsvMarketData::new(data_dir).with_scorer(Arc::clone(&scorer));
            let counts = compute_features(&source, &mut store, &config, &symbols, start, end)?;
            store.save(&cli.store)?;

            println!("Feature computation complete:");
            for (symbol, count) in &counts {
                println!("  {symbol}: {count} rows");
            }
            println!("Total: {} rows", counts.values().sum::<usize>());
        }

        Commands::Label {
            data_dir,
            symbols,
            start,
            end,
            horizon_days,
        } => {
            let end = parse_date_or_today(end.as_deref())?;
            let start = match start.as_deref() {
                Some(s) => parse_date(s)?,
                None => end - chrono::Duration::days(config.feature_lookback_days),
            };

            let source = CsvMarketData::new(data_dir).with_scorer(Arc::clone(&scorer));
            let updated = compute_labels(
                &source,
                &mut store,
                &config,
                &symbols,
                start,
                end,
                horizon_days,
            )?;
            store.save(&cli.store)?;

            println!("Labeled {updated} feature rows (horizon {horizon_days}d)");
        }

        Commands::Train {
            symbols,
            start,
            end,
            n_splits,
            embargo_days,
            test_size,
            seed,
            output_dir,
        } => {
            let request = TrainRequest {
                symbols: if symbols.is_empty() { None } else { Some(symbols) },
                start: start.as_deref().map(parse_date).transpose()?,
                end: end.as_deref().map(parse_date).transpose()?,
                n_splits,
                embargo_days,
                test_size,
                model_params: GbmParams::default(),
                seed,
                output_dir: output_dir.clone(),
            };

            let report = train_with_cv(&store, &request)?;

            println!("Training run {} complete", report.run_id);
            println!(
                "  folds: {} (requested {n_splits})",
                report.overall.n_folds
            );
            println!(
                "  rmse: {:.6} ± {:.6}",
                report.overall.rmse_mean, report.overall.rmse_std
            );
            println!(
                "  direction accuracy: {:.2}% ± {:.2}%",
                report.overall.direction_accuracy_mean * 100.0,
                report.overall.direction_accuracy_std * 100.0
            );
            println!("  artifacts: {}", output_dir.display());
        }

        Commands::Infer {
            model,
            symbols,
            date,
            horizon_days,
        } => {
            let date = parse_date(&date)?;
            let symbols = if symbols.is_empty() {
                None
            } else {
                Some(symbols)
            };

            let upserted =
                run_inference(&model, &mut store, symbols.as_deref(), date, horizon_days)?;
            store.save(&cli.store)?;

            println!("Upserted {upserted} predictions for {date} (horizon {horizon_days}d)");
        }
    }

    Ok(())
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    raw.parse::<NaiveDate>()
        .with_context(|| format!("invalid date '{raw}' (expected YYYY-MM-DD)"))
}

fn parse_date_or_today(raw: Option<&str>) -> Result<NaiveDate> {
    match raw {
        Some(s) => parse_date(s),
        None => Ok(chrono::Local::now().date_naive()),
    }
}
