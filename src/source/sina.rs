use std::num::NonZeroU32;

use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{REFERER, USER_AGENT};
use tracing::debug;

use crate::error::FetchError;
use crate::model::{PricedCode, Quote, QuoteConvention};
use crate::source::QuoteSource;

const SINA_REFERER: &str = "https://finance.sina.com.cn/";
/// The endpoint rejects requests without a browser-like agent.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// Positions of the price fields within one quote line.
struct FieldLayout {
    min_fields: usize,
    current: usize,
    open: usize,
    prev_close: usize,
}

impl FieldLayout {
    fn for_convention(convention: QuoteConvention) -> Self {
        match convention {
            // name, open, prev_close, current, high, low, ...
            QuoteConvention::Equity => Self {
                min_fields: 4,
                current: 3,
                open: 1,
                prev_close: 2,
            },
            // time, bid, ask, prev_close, swing, open, high, low, current, name, ...
            QuoteConvention::Currency => Self {
                min_fields: 9,
                current: 8,
                open: 5,
                prev_close: 3,
            },
        }
    }
}

pub struct SinaQuoteSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: DefaultDirectRateLimiter,
}

impl SinaQuoteSource {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        requests_per_second: NonZeroU32,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            rate_limiter: RateLimiter::direct(Quota::per_second(requests_per_second)),
        }
    }

    async fn fetch_text(&self, list: &str) -> Result<String, Report<FetchError>> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, list);
        let network_error = || FetchError::Network {
            endpoint: self.base_url.clone(),
        };

        let response = self
            .client
            .get(&url)
            .header(REFERER, SINA_REFERER)
            .header(USER_AGENT, BROWSER_USER_AGENT)
            .send()
            .await
            .change_context(network_error())?;

        if !response.status().is_success() {
            return Err(Report::new(network_error())
                .attach(format!("HTTP status: {}", response.status())));
        }

        let bytes = response.bytes().await.change_context(network_error())?;
        Ok(decode_body(&bytes))
    }
}

impl QuoteSource for SinaQuoteSource {
    fn name(&self) -> &str {
        "sina"
    }

    fn fetch_quote(
        &self,
        code: &str,
        convention: QuoteConvention,
    ) -> BoxFuture<'_, Result<Quote, Report<FetchError>>> {
        let code = code.to_owned();
        Box::pin(async move {
            let body = self.fetch_text(&code).await?;
            decode_quote(&body, convention).attach_with(|| format!("code: {code}"))
        })
    }

    fn fetch_prices(
        &self,
        codes: &[String],
    ) -> BoxFuture<'_, Result<Vec<PricedCode>, Report<FetchError>>> {
        let list = codes.join(",");
        Box::pin(async move {
            if list.is_empty() {
                return Ok(Vec::new());
            }
            let body = self.fetch_text(&list).await?;
            decode_batch(&body)
        })
    }
}

/// Decode a response body. The endpoint sends GBK regardless of the
/// declared charset.
pub fn decode_body(bytes: &[u8]) -> String {
    let (text, _, had_errors) = encoding_rs::GBK.decode(bytes);
    if had_errors {
        debug!(len = bytes.len(), "quote response contained undecodable bytes");
    }
    text.into_owned()
}

/// Split `var hq_str_<code>="<payload>";` into `(code, payload)`.
fn split_assignment(line: &str) -> Option<(&str, &str)> {
    let (lhs, rhs) = line.split_once("=\"")?;
    let lhs = lhs.trim();
    let code = lhs.rsplit_once("hq_str_").map_or(lhs, |(_, code)| code);
    let payload = rhs.trim_end().trim_end_matches([';', '"']);
    Some((code, payload))
}

fn parse_price(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Decode the comma-separated payload of one quote line.
pub fn decode_fields(payload: &str, convention: QuoteConvention) -> Result<Quote, Report<FetchError>> {
    let layout = FieldLayout::for_convention(convention);
    let fields: Vec<&str> = payload.split(',').collect();

    if fields.len() < layout.min_fields {
        return Err(Report::new(FetchError::Parse {
            reason: format!(
                "expected at least {} fields, got {}",
                layout.min_fields,
                fields.len()
            ),
        }));
    }

    let raw_current = fields[layout.current];
    let current = parse_price(raw_current).ok_or_else(|| {
        Report::new(FetchError::Parse {
            reason: format!("current price \"{}\" is not numeric", raw_current.trim()),
        })
    })?;

    Ok(Quote {
        current_price: Some(current),
        open_price: parse_price(fields[layout.open]),
        prev_close: parse_price(fields[layout.prev_close]),
        sample_size: None,
    })
}

/// Decode a single-quote response body.
pub fn decode_quote(body: &str, convention: QuoteConvention) -> Result<Quote, Report<FetchError>> {
    let (_, payload) = body
        .lines()
        .find_map(split_assignment)
        .ok_or_else(|| {
            Report::new(FetchError::Format {
                reason: "response contains no quote assignment".into(),
            })
        })?;

    decode_fields(payload, convention)
}

/// Decode a multi-line batch response body with the equity layout.
///
/// Only called for a non-empty request, so a body without any quote line is
/// a format error.
pub fn decode_batch(body: &str) -> Result<Vec<PricedCode>, Report<FetchError>> {
    let priced: Vec<PricedCode> = body
        .lines()
        .filter_map(split_assignment)
        .map(|(code, payload)| PricedCode {
            code: code.to_owned(),
            price: decode_fields(payload, QuoteConvention::Equity)
                .ok()
                .and_then(|quote| quote.current_price),
        })
        .collect();

    if priced.is_empty() {
        return Err(Report::new(FetchError::Format {
            reason: "batch response contains no quote assignment".into(),
        }));
    }

    Ok(priced)
}
