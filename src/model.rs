use std::fmt;

/// How a target's current price is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// A single real-time quote from the quote endpoint.
    Quote,
    /// Mean price of the listed convertible-bond universe.
    BondAverage,
}

impl SourceKind {
    /// Parse a config-format string into a `SourceKind`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "quote" => Some(Self::Quote),
            "bond_average" => Some(Self::BondAverage),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::BondAverage => "bond_average",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Field layout of a quote line.
///
/// Equities, indices and bonds share one layout; currency pairs use another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuoteConvention {
    Equity,
    Currency,
}

impl QuoteConvention {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "equity" => Some(Self::Equity),
            "currency" => Some(Self::Currency),
            _ => None,
        }
    }
}

/// Whether a target is fetched on every run or only during trading hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Schedule {
    Always,
    TradingHours,
}

impl Schedule {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "always" => Some(Self::Always),
            "trading_hours" => Some(Self::TradingHours),
            _ => None,
        }
    }
}

/// A monitored instrument or aggregate with its configured threshold.
#[derive(Debug, Clone)]
pub struct Target {
    pub id: String,
    pub name: String,
    pub source: SourceKind,
    pub code: Option<String>,
    pub convention: QuoteConvention,
    /// A negative value marks a sell level at the absolute price.
    pub target_price: Option<f64>,
    pub note: String,
    pub schedule: Schedule,
}

impl Target {
    pub fn is_sell_level(&self) -> bool {
        self.target_price.is_some_and(|t| t < 0.0)
    }
}

/// Prices decoded from one quote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Quote {
    pub current_price: Option<f64>,
    pub open_price: Option<f64>,
    pub prev_close: Option<f64>,
    /// Number of prices averaged, for aggregate targets.
    pub sample_size: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Format,
    Parse,
    EmptyResult,
    Config,
    MarketClosed,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network error",
            Self::Format => "format error",
            Self::Parse => "parse error",
            Self::EmptyResult => "no valid data",
            Self::Config => "config error",
            Self::MarketClosed => "market closed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of fetching one target.
#[derive(Debug, Clone, PartialEq)]
pub enum QuoteResult {
    Priced(Quote),
    Failed { kind: ErrorKind, detail: String },
}

impl QuoteResult {
    pub fn failed(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            kind,
            detail: detail.into(),
        }
    }

    pub fn current_price(&self) -> Option<f64> {
        match self {
            Self::Priced(quote) => quote.current_price,
            Self::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EvaluatedTarget {
    pub target: Target,
    pub result: QuoteResult,
    /// `(current - target) / current`.
    pub deviation_ratio: Option<f64>,
    /// Deviation from the price level `|target|`; drives alerting.
    pub level_distance: Option<f64>,
    pub triggered_today: bool,
}

/// Price decoded for one code in a batch response.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedCode {
    pub code: String,
    pub price: Option<f64>,
}
