use chrono::{DateTime, Datelike, FixedOffset, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// Offset of the exchange's local time (UTC+8).
const MARKET_OFFSET_SECS: i32 = 8 * 3600;

/// Trading sessions as `(start, end)` minutes since midnight, inclusive.
const SESSIONS: &[(u32, u32)] = &[(9 * 60 + 30, 11 * 60 + 30), (13 * 60, 15 * 60)];

pub fn market_offset() -> FixedOffset {
    FixedOffset::east_opt(MARKET_OFFSET_SECS).unwrap()
}

/// Current time in the market time zone.
pub fn market_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&market_offset())
}

/// Whether `now` falls in a weekday trading session.
///
/// Exchange holidays are not known and count as trading days.
pub fn is_trading_time<Tz: TimeZone>(now: &DateTime<Tz>) -> bool {
    let local = now.with_timezone(&market_offset());
    if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    let minutes = local.hour() * 60 + local.minute();
    SESSIONS
        .iter()
        .any(|&(start, end)| minutes >= start && minutes <= end)
}

/// Session boundaries, for display.
pub fn session_label() -> String {
    SESSIONS
        .iter()
        .filter_map(|&(start, end)| {
            let start = NaiveTime::from_hms_opt(start / 60, start % 60, 0)?;
            let end = NaiveTime::from_hms_opt(end / 60, end % 60, 0)?;
            Some(format!("{}-{}", start.format("%H:%M"), end.format("%H:%M")))
        })
        .collect::<Vec<_>>()
        .join(", ")
}
