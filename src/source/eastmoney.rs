use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::source::BondUniverse;

const BOND_REPORT_NAME: &str = "RPT_BOND_CB_LIST";
const JSONP_CALLBACK: &str = "jQuery";

pub struct EastmoneyBondUniverse {
    client: reqwest::Client,
    url: String,
    page_size: u32,
}

impl EastmoneyBondUniverse {
    pub fn new(client: reqwest::Client, url: impl Into<String>, page_size: u32) -> Self {
        Self {
            client,
            url: url.into(),
            page_size,
        }
    }
}

impl BondUniverse for EastmoneyBondUniverse {
    fn fetch_bond_codes(&self) -> BoxFuture<'_, Result<Vec<String>, Report<FetchError>>> {
        Box::pin(async move {
            let network_error = || FetchError::Network {
                endpoint: self.url.clone(),
            };

            let page_size = self.page_size.to_string();
            let params = [
                ("reportName", BOND_REPORT_NAME),
                ("columns", "ALL"),
                ("source", "WEB"),
                ("client", "WEB"),
                ("sortColumns", "PUBLIC_START_DATE"),
                ("sortTypes", "-1"),
                ("pageNumber", "1"),
                ("pageSize", page_size.as_str()),
                ("callback", JSONP_CALLBACK),
            ];

            let response = self
                .client
                .get(&self.url)
                .query(&params)
                .send()
                .await
                .change_context(network_error())?;

            if !response.status().is_success() {
                return Err(Report::new(network_error())
                    .attach(format!("HTTP status: {}", response.status())));
            }

            let body = response.text().await.change_context(network_error())?;
            let codes = parse_bond_listing(&body)?;

            info!(count = codes.len(), "bond universe fetched");
            Ok(codes)
        })
    }
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    result: Option<ListingPage>,
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    #[serde(default)]
    data: Vec<BondRow>,
}

#[derive(Debug, Deserialize)]
struct BondRow {
    #[serde(rename = "SECURITY_CODE")]
    security_code: String,
    #[serde(rename = "DELIST_DATE", default)]
    delist_date: Option<String>,
}

/// Remove a `callback(...)` wrapper. Plain JSON passes through.
pub fn strip_jsonp(body: &str) -> Result<&str, Report<FetchError>> {
    let trimmed = body.trim().trim_end_matches(';').trim_end();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return Ok(trimmed);
    }

    match (trimmed.find('('), trimmed.rfind(')')) {
        (Some(open), Some(close)) if open < close => Ok(&trimmed[open + 1..close]),
        _ => Err(Report::new(FetchError::Format {
            reason: "unbalanced JSONP wrapper".into(),
        })),
    }
}

/// Prefix a raw bond code with its exchange: `11*` trades in Shanghai,
/// `12*` in Shenzhen.
pub fn canonicalize_code(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match &raw[..2] {
        "11" => Some(format!("sh{raw}")),
        "12" => Some(format!("sz{raw}")),
        _ => None,
    }
}

/// Parse the listing body into unique, exchange-prefixed codes of bonds
/// that are not delisted, in response order.
///
/// A listing that yields no code is a parse error.
pub fn parse_bond_listing(body: &str) -> Result<Vec<String>, Report<FetchError>> {
    let json = strip_jsonp(body)?;
    let response: ListingResponse =
        serde_json::from_str(json).change_context(FetchError::Parse {
            reason: "bond listing does not match the expected schema".into(),
        })?;

    if !response.success {
        return Err(Report::new(FetchError::Parse {
            reason: format!(
                "bond listing reported failure: {}",
                response.message.as_deref().unwrap_or("no message")
            ),
        }));
    }

    let rows = response.result.map(|page| page.data).unwrap_or_default();
    let mut seen = std::collections::HashSet::new();
    let mut codes = Vec::with_capacity(rows.len());
    let fetched = rows.len();
    for row in rows.iter().filter(|row| row.delist_date.is_none()) {
        match canonicalize_code(&row.security_code) {
            Some(code) => {
                if seen.insert(code.clone()) {
                    codes.push(code);
                }
            }
            None => debug!(code = %row.security_code, "skipping bond with unknown exchange prefix"),
        }
    }

    if codes.is_empty() {
        return Err(Report::new(FetchError::Parse {
            reason: format!("bond listing has no tradable bond among {fetched} rows"),
        }));
    }

    Ok(codes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_jsonp_wrapper() {
        let body = "jQuery123({\"success\":true});";
        assert_eq!(strip_jsonp(body).unwrap(), "{\"success\":true}");
    }

    #[test]
    fn plain_json_passes_through() {
        let body = "  {\"success\":true}\n";
        assert_eq!(strip_jsonp(body).unwrap(), "{\"success\":true}");
    }

    #[test]
    fn unbalanced_wrapper_is_format_error() {
        let err = strip_jsonp("jQuery({\"success\":true}").unwrap_err();
        assert!(matches!(err.current_context(), FetchError::Format { .. }));
    }

    #[test]
    fn canonicalizes_by_numeric_prefix() {
        assert_eq!(canonicalize_code("113001").as_deref(), Some("sh113001"));
        assert_eq!(canonicalize_code("123045").as_deref(), Some("sz123045"));
        assert_eq!(canonicalize_code("128136").as_deref(), Some("sz128136"));
        assert_eq!(canonicalize_code("404001"), None);
        assert_eq!(canonicalize_code("11300"), None);
        assert_eq!(canonicalize_code("11a001"), None);
    }

    #[test]
    fn listing_keeps_trading_bonds_only() {
        let body = r#"jQuery({
            "success": true,
            "message": "ok",
            "result": {"data": [
                {"SECURITY_CODE": "113001", "LISTING_DATE": "2020-01-01 00:00:00", "DELIST_DATE": null},
                {"SECURITY_CODE": "123001", "LISTING_DATE": "2020-02-01 00:00:00"},
                {"SECURITY_CODE": "113002", "LISTING_DATE": "2019-01-01 00:00:00", "DELIST_DATE": "2023-01-01 00:00:00"},
                {"SECURITY_CODE": "113003", "LISTING_DATE": null},
                {"SECURITY_CODE": "404001", "LISTING_DATE": "2020-01-01 00:00:00"},
                {"SECURITY_CODE": "113001", "LISTING_DATE": "2020-01-01 00:00:00"}
            ]}
        });"#;
        let codes = parse_bond_listing(body).unwrap();
        assert_eq!(
            codes,
            vec![
                "sh113001".to_owned(),
                "sz123001".to_owned(),
                "sh113003".to_owned()
            ]
        );
    }

    #[test]
    fn rows_without_dates_are_kept() {
        let body = r#"{"success": true, "result": {"data": [
            {"SECURITY_CODE": "113001"},
            {"SECURITY_CODE": "123001", "DELIST_DATE": null}
        ]}}"#;
        let codes = parse_bond_listing(body).unwrap();
        assert_eq!(codes, vec!["sh113001".to_owned(), "sz123001".to_owned()]);
    }

    #[test]
    fn listing_without_tradable_bonds_is_parse_error() {
        let body = r#"jQuery({"success": true, "result": {"data": [
            {"SECURITY_CODE": "113002", "DELIST_DATE": "2023-01-01 00:00:00"},
            {"SECURITY_CODE": "404001"}
        ]}});"#;
        let err = parse_bond_listing(body).unwrap_err();
        assert!(matches!(err.current_context(), FetchError::Parse { .. }));

        let err = parse_bond_listing(r#"{"success": true, "result": null}"#).unwrap_err();
        assert!(matches!(err.current_context(), FetchError::Parse { .. }));
    }

    #[test]
    fn listing_failure_is_parse_error() {
        let body = r#"jQuery({"success": false, "message": "empty", "result": null});"#;
        let err = parse_bond_listing(body).unwrap_err();
        assert!(matches!(err.current_context(), FetchError::Parse { .. }));
    }

    #[test]
    fn schema_mismatch_is_parse_error() {
        let err = parse_bond_listing(r#"jQuery({"success": "yes"})"#).unwrap_err();
        assert!(matches!(err.current_context(), FetchError::Parse { .. }));
    }

    /// Integration test: requires network access. Run with `cargo test -- --ignored`
    #[tokio::test]
    #[ignore]
    async fn integration_fetch_bond_codes() {
        let universe = EastmoneyBondUniverse::new(
            reqwest::Client::new(),
            "https://datacenter-web.eastmoney.com/api/data/v1/get",
            1000,
        );
        let codes = universe.fetch_bond_codes().await.unwrap();
        assert!(!codes.is_empty());
    }
}
