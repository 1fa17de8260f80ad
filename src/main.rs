mod aggregate;
mod alert;
mod config;
mod error;
mod evaluate;
mod market;
mod model;
mod notifier;
mod pipeline;
mod report;
mod source;
mod storage;
mod target;

use std::fs::OpenOptions;
use std::num::NonZeroU32;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use clap::Parser;
use derive_more::{Display, Error};
use error_stack::{Report, ResultExt};
use nonzero_ext::nonzero;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use alert::Outcome;
use config::AppConfig;
use evaluate::SortOrder;
use model::Target;
use notifier::Notifier;
use notifier::pushplus::PushPlusNotifier;
use notifier::terminal::TerminalNotifier;
use pipeline::{RunSettings, Sources};
use report::ReportSettings;
use source::eastmoney::EastmoneyBondUniverse;
use source::sina::SinaQuoteSource;
use storage::NotificationLog;

#[derive(Debug, Display, Error)]
pub enum AppError {
    #[display("configuration error")]
    Config,
    #[display("runtime error")]
    Runtime,
    #[display("failed to write report")]
    Report,
}

#[derive(Parser)]
#[command(
    name = "price-monitor",
    about = "Check quotes against target prices and publish an HTML report"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log alerts to the terminal instead of pushing them; the notification
    /// log is left untouched
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(report) = run().await {
        eprintln!("{report:?}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<AppError>> {
    let cli = Cli::parse();
    let config = config::load(Path::new(&cli.config)).change_context(AppError::Config)?;

    init_tracing(&config).change_context(AppError::Config)?;

    let general = &config.general;
    let targets = Target::from_config(&config);
    if targets.is_empty() {
        warn!("no targets configured; the report will be empty");
    }

    // ── Sources ───────────────────────────────────────────────────────────────
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(general.request_timeout_secs))
        .build()
        .change_context(AppError::Runtime)?;

    let requests_per_second =
        NonZeroU32::new(config.sources.requests_per_second).unwrap_or(nonzero!(5u32));
    let quotes = SinaQuoteSource::new(
        client.clone(),
        config.sources.quote_url.as_str(),
        requests_per_second,
    );
    let bonds = EastmoneyBondUniverse::new(
        client.clone(),
        config.sources.bond_list_url.as_str(),
        config.sources.bond_page_size,
    );

    // ── Notifier ──────────────────────────────────────────────────────────────
    let notifier: Option<Box<dyn Notifier>> = if cli.dry_run {
        Some(Box::new(TerminalNotifier) as Box<dyn Notifier>)
    } else {
        match PushPlusNotifier::from_env(client, &config.push.endpoint, &config.push.token_env) {
            Ok(n) => Some(Box::new(n) as Box<dyn Notifier>),
            Err(e) => {
                warn!(error = %e, "push notifications disabled");
                None
            }
        }
    };

    let log_path = Path::new(&general.notification_log);
    let mut log = NotificationLog::load(log_path);
    info!(entries = log.entries().len(), "notification log loaded");

    // ── Run ───────────────────────────────────────────────────────────────────
    let settings = RunSettings {
        notification_tolerance: general.notification_tolerance,
        price_ceiling: general.price_ceiling,
        sort_order: SortOrder::from_str(&general.sort_order).unwrap_or(SortOrder::Ratio),
        report: ReportSettings {
            title: general.report_title.clone(),
            refresh_interval_secs: general.refresh_interval_secs,
        },
    };
    let sources = Sources {
        quotes: &quotes,
        bonds: &bonds,
    };

    info!(targets = targets.len(), dry_run = cli.dry_run, "starting run");
    let output = pipeline::run_once(
        &targets,
        &sources,
        notifier.as_deref(),
        &mut log,
        &settings,
        market::market_now(),
    )
    .await;

    // ── Outputs ───────────────────────────────────────────────────────────────
    if let Err(e) = write_report(Path::new(&general.output_file), &output.html) {
        error!(error = ?e, "report not written");
    }

    let sent = output
        .outcomes
        .iter()
        .filter(|o| **o == Outcome::Sent)
        .count();
    let failed = output
        .targets
        .iter()
        .filter(|t| matches!(t.result, model::QuoteResult::Failed { .. }))
        .count();
    info!(
        path = %general.output_file,
        targets = output.targets.len(),
        failed,
        sent,
        "run finished"
    );

    if cli.dry_run {
        if log.is_dirty() {
            info!("dry run, notification log changes discarded");
        }
    } else {
        match log.save_if_changed(log_path) {
            Ok(true) => info!(path = %log_path.display(), "notification log updated"),
            Ok(false) => {}
            Err(e) => warn!(error = ?e, "failed to persist notification log"),
        }
    }

    Ok(())
}

fn write_report(path: &Path, html: &str) -> Result<(), Report<AppError>> {
    std::fs::write(path, html)
        .change_context(AppError::Report)
        .attach_with(|| format!("path: {}", path.display()))
}

fn init_tracing(config: &AppConfig) -> Result<(), Report<std::io::Error>> {
    let filter = EnvFilter::new(&config.general.log_level);

    if let Some(path) = &config.general.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .attach_with(|| format!("log file: {path}"))?;
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        match config.general.log_format.as_str() {
            "json" => builder.json().init(),
            _ => builder.init(),
        }
        return Ok(());
    }

    match config.general.log_format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
    Ok(())
}
