use std::fmt::Write as _;

use chrono::{DateTime, FixedOffset};

use crate::market;
use crate::model::{ErrorKind, EvaluatedTarget, QuoteResult};

const GREEN: &str = "#27ae60";
const ORANGE: &str = "#e67e22";
const BLUE: &str = "#3498db";
const GREY: &str = "#7f8c8d";
const RED: &str = "#e74c3c";

const STYLE: &str = r#"
        body { font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif; text-align: center; margin-top: 50px; background-color: #f4f4f9; }
        h1 { color: #2c3e50; font-size: 2.2em; }
        table { width: 95%; margin: 30px auto; border-collapse: collapse; box-shadow: 0 4px 8px rgba(0,0,0,0.1); background-color: white; }
        th, td { border: 1px solid #ddd; padding: 15px; text-align: center; }
        th:last-child, td:last-child { text-align: left; }
        th { background-color: #3498db; color: white; font-weight: bold; }
        tr:nth-child(even) { background-color: #f2f2f2; }
        .timestamp { color: #7f8c8d; margin-top: 30px; font-size: 1.2em; }
        .badge { color: #8e44ad; font-weight: bold; }
"#;

#[derive(Debug, Clone)]
pub struct ReportSettings {
    pub title: String,
    pub refresh_interval_secs: u64,
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Color of the current price relative to the target.
///
/// For sell levels being above the price is the favorable side, so the
/// colors swap.
fn price_color(current: f64, target: Option<f64>, sell_level: bool) -> &'static str {
    let Some(target) = target else {
        return GREY;
    };
    let at_or_above = current >= target.abs();
    match (at_or_above, sell_level) {
        (true, false) | (false, true) => ORANGE,
        (false, false) | (true, true) => GREEN,
    }
}

/// Color of the deviation cell, taken from the distance to the price level
/// so it agrees with the price cell.
fn ratio_color(distance: Option<f64>, sell_level: bool) -> &'static str {
    match distance {
        None => GREY,
        Some(d) if d == 0.0 => BLUE,
        Some(d) if (d < 0.0) != sell_level => GREEN,
        Some(_) => ORANGE,
    }
}

fn render_row(row: &mut String, evaluated: &EvaluatedTarget) {
    let target = &evaluated.target;

    let target_display = target
        .target_price
        .map_or_else(|| "N/A".to_owned(), |p| format!("{p:.4}"));

    let price_title = match &evaluated.result {
        QuoteResult::Priced(quote) => {
            let fmt = |p: Option<f64>| p.map_or_else(|| "N/A".to_owned(), |p| format!("{p:.3}"));
            format!("open {}, prev close {}", fmt(quote.open_price), fmt(quote.prev_close))
        }
        QuoteResult::Failed { .. } => String::new(),
    };

    let (price_display, price_color) = match &evaluated.result {
        QuoteResult::Priced(quote) => match quote.current_price {
            Some(current) => (
                format!("{current:.3}"),
                price_color(current, target.target_price, target.is_sell_level()),
            ),
            None => ("N/A".to_owned(), GREY),
        },
        QuoteResult::Failed {
            kind: ErrorKind::MarketClosed,
            detail,
        } => (escape_html(detail), GREY),
        QuoteResult::Failed { kind, detail } => {
            (format!("{}: {}", kind, escape_html(detail)), RED)
        }
    };

    let ratio_display = evaluated
        .deviation_ratio
        .map_or_else(|| "N/A".to_owned(), |r| format!("{:.2}%", r * 100.0));
    let ratio_title = match evaluated.level_distance {
        Some(d) if target.is_sell_level() => format!("{:.2}% from sell level", d * 100.0),
        _ => String::new(),
    };

    let mut note = escape_html(&target.note);
    if let QuoteResult::Priced(quote) = &evaluated.result {
        if let Some(count) = quote.sample_size {
            if !note.is_empty() {
                note.push(' ');
            }
            let _ = write!(note, "(mean of {count})");
        }
    }
    if evaluated.triggered_today {
        note.push_str(r#" <span class="badge">&#128276; notified today</span>"#);
    }

    let _ = write!(
        row,
        r#"
        <tr>
            <td>{name}</td>
            <td>{id}</td>
            <td>{target_display}</td>
            <td title="{price_title}" style="color: {price_color}; font-weight: bold;">{price_display}</td>
            <td title="{ratio_title}" style="color: {ratio_color}; font-weight: bold;">{ratio_display}</td>
            <td>{note}</td>
        </tr>"#,
        name = escape_html(&target.name),
        id = escape_html(&target.id),
        ratio_color = ratio_color(evaluated.level_distance, target.is_sell_level()),
    );
}

/// Render the report page. Deterministic for a given input and `now`.
pub fn render(
    targets: &[EvaluatedTarget],
    settings: &ReportSettings,
    now: &DateTime<FixedOffset>,
) -> String {
    let mut rows = String::new();
    for evaluated in targets {
        render_row(&mut rows, evaluated);
    }

    let status = if market::is_trading_time(now) {
        format!(r#"<span style="color: {GREEN};">trading session</span>"#)
    } else {
        format!(r#"<span style="color: {ORANGE};">market closed</span>"#)
    };

    let title = escape_html(&settings.title);
    let refresh = settings.refresh_interval_secs;

    format!(
        r#"<!DOCTYPE html>
<html lang="zh">
<head>
    <meta charset="UTF-8">
    <meta http-equiv="refresh" content="{refresh}">
    <meta name="robots" content="noindex, nofollow">
    <title>{title}</title>
    <style>{STYLE}    </style>
</head>
<body>
    <h1>{title}</h1>
    <table>
        <tr>
            <th>Name</th>
            <th>Code</th>
            <th>Target</th>
            <th>Current</th>
            <th>Deviation</th>
            <th>Note</th>
        </tr>{rows}
    </table>
    <div class="timestamp">Updated {timestamp} (UTC+8) | {status}</div>
    <div class="timestamp">Sessions {sessions}; page refreshes every {refresh} seconds.</div>
</body>
</html>
"#,
        timestamp = now.format("%Y-%m-%d %H:%M:%S"),
        sessions = market::session_label(),
    )
}
