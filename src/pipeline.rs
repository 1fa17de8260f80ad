use chrono::{DateTime, FixedOffset};
use error_stack::Report;
use tracing::{debug, info, warn};

use crate::aggregate::mean_below_ceiling;
use crate::alert::{self, Outcome};
use crate::error::FetchError;
use crate::evaluate::{self, SortOrder};
use crate::market;
use crate::model::{ErrorKind, EvaluatedTarget, Quote, QuoteResult, Schedule, SourceKind, Target};
use crate::notifier::Notifier;
use crate::report::{self, ReportSettings};
use crate::source::{BondUniverse, QuoteSource};
use crate::storage::NotificationLog;

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub notification_tolerance: f64,
    pub price_ceiling: f64,
    pub sort_order: SortOrder,
    pub report: ReportSettings,
}

pub struct Sources<'a> {
    pub quotes: &'a dyn QuoteSource,
    pub bonds: &'a dyn BondUniverse,
}

pub struct RunOutput {
    /// Targets in display order.
    pub targets: Vec<EvaluatedTarget>,
    /// Notification outcome per entry of `targets`.
    pub outcomes: Vec<Outcome>,
    pub html: String,
}

fn fetch_failure(report: &Report<FetchError>) -> QuoteResult {
    let context = report.current_context();
    let kind = match context {
        FetchError::Network { .. } => ErrorKind::Network,
        FetchError::Format { .. } => ErrorKind::Format,
        FetchError::Parse { .. } => ErrorKind::Parse,
    };
    QuoteResult::failed(kind, context.to_string())
}

async fn fetch_single(target: &Target, quotes: &dyn QuoteSource) -> QuoteResult {
    let Some(code) = target.code.as_deref() else {
        return QuoteResult::failed(ErrorKind::Config, "no lookup code configured");
    };

    match quotes.fetch_quote(code, target.convention).await {
        Ok(quote) => QuoteResult::Priced(quote),
        Err(e) => {
            warn!(error = ?e, target_id = %target.id, source = quotes.name(), "quote fetch failed");
            fetch_failure(&e)
        }
    }
}

async fn fetch_bond_average(target: &Target, sources: &Sources<'_>, ceiling: f64) -> QuoteResult {
    let codes = match sources.bonds.fetch_bond_codes().await {
        Ok(codes) => codes,
        Err(e) => {
            warn!(error = ?e, target_id = %target.id, "bond universe fetch failed");
            return fetch_failure(&e);
        }
    };
    if codes.is_empty() {
        warn!(target_id = %target.id, "bond universe is empty");
        return QuoteResult::failed(ErrorKind::Parse, "bond universe is empty");
    }

    let priced = match sources.quotes.fetch_prices(&codes).await {
        Ok(priced) => priced,
        Err(e) => {
            warn!(error = ?e, target_id = %target.id, bonds = codes.len(), "bond batch quote failed");
            return fetch_failure(&e);
        }
    };
    if priced.is_empty() {
        warn!(target_id = %target.id, bonds = codes.len(), "bond batch quote returned no lines");
        return QuoteResult::failed(ErrorKind::Format, "batch response contains no quote line");
    }

    for unpriced in priced.iter().filter(|p| p.price.is_none()) {
        debug!(code = %unpriced.code, "bond quote has no usable price");
    }
    let prices: Vec<f64> = priced.iter().filter_map(|p| p.price).collect();
    match mean_below_ceiling(&prices, ceiling) {
        Ok(aggregate) => {
            info!(
                target_id = %target.id,
                universe = codes.len(),
                priced = prices.len(),
                kept = aggregate.count,
                mean = aggregate.mean,
                "bond average computed"
            );
            QuoteResult::Priced(Quote {
                current_price: Some(aggregate.mean),
                open_price: None,
                prev_close: None,
                sample_size: Some(aggregate.count),
            })
        }
        Err(e) => {
            warn!(error = ?e, target_id = %target.id, "bond average has no valid input");
            QuoteResult::failed(ErrorKind::EmptyResult, e.current_context().to_string())
        }
    }
}

/// Fetch one target according to its source and schedule.
pub async fn fetch_target(
    target: &Target,
    sources: &Sources<'_>,
    ceiling: f64,
    now: &DateTime<FixedOffset>,
) -> QuoteResult {
    if target.schedule == Schedule::TradingHours && !market::is_trading_time(now) {
        info!(target_id = %target.id, "outside trading hours, not fetched");
        return QuoteResult::failed(ErrorKind::MarketClosed, "not fetched outside trading hours");
    }

    match target.source {
        SourceKind::Quote => fetch_single(target, sources.quotes).await,
        SourceKind::BondAverage => fetch_bond_average(target, sources, ceiling).await,
    }
}

/// Fetch, evaluate, sort, notify, and render.
///
/// Targets are fetched sequentially in configuration order. The notification
/// log is mutated in memory only; persisting it is up to the caller.
pub async fn run_once(
    targets: &[Target],
    sources: &Sources<'_>,
    notifier: Option<&dyn Notifier>,
    log: &mut NotificationLog,
    settings: &RunSettings,
    now: DateTime<FixedOffset>,
) -> RunOutput {
    let mut evaluated = Vec::with_capacity(targets.len());
    for target in targets {
        let result = fetch_target(target, sources, settings.price_ceiling, &now).await;
        if let QuoteResult::Priced(quote) = &result {
            info!(target_id = %target.id, current = ?quote.current_price, "target priced");
        }
        evaluated.push(evaluate::evaluate(target.clone(), result));
    }

    evaluate::sort_targets(&mut evaluated, settings.sort_order);

    let today = now.date_naive();
    let outcomes = alert::dispatch(
        &evaluated,
        log,
        notifier,
        today,
        settings.notification_tolerance,
    )
    .await;

    for item in &mut evaluated {
        item.triggered_today = log.notified_on(&item.target.id, today);
    }

    let html = report::render(&evaluated, &settings.report, &now);

    RunOutput {
        targets: evaluated,
        outcomes,
        html,
    }
}
