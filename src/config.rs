use std::path::Path;

use error_stack::{Report, ResultExt};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::model::{QuoteConvention, Schedule, SourceKind};

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "text".into()
}

fn default_output_file() -> String {
    "index_price.html".into()
}

fn default_notification_log() -> String {
    "notification_log.json".into()
}

fn default_refresh_interval_secs() -> u64 {
    300
}

fn default_notification_tolerance() -> f64 {
    0.0005
}

fn default_price_ceiling() -> f64 {
    1000.0
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_sort_order() -> String {
    "ratio".into()
}

fn default_report_title() -> String {
    "Price Monitor".into()
}

fn default_quote_url() -> String {
    "https://hq.sinajs.cn/list=".into()
}

fn default_bond_list_url() -> String {
    "https://datacenter-web.eastmoney.com/api/data/v1/get".into()
}

fn default_bond_page_size() -> u32 {
    1000
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_push_endpoint() -> String {
    "https://www.pushplus.plus/send".into()
}

fn default_token_env() -> String {
    "PUSHPLUS_TOKEN".into()
}

fn default_convention() -> String {
    "equity".into()
}

fn default_schedule() -> String {
    "always".into()
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub push: PushConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Accepted values: `"text"` | `"json"`
    #[serde(default = "default_log_format")]
    pub log_format: String,
    pub log_file: Option<String>,
    #[serde(default = "default_output_file")]
    pub output_file: String,
    #[serde(default = "default_notification_log")]
    pub notification_log: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Maximum `|ratio|` at which a target counts as reached.
    #[serde(default = "default_notification_tolerance")]
    pub notification_tolerance: f64,
    /// Aggregate prices at or above this are treated as anomalous.
    #[serde(default = "default_price_ceiling")]
    pub price_ceiling: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Accepted values: `"ratio"` | `"distance"`
    #[serde(default = "default_sort_order")]
    pub sort_order: String,
    #[serde(default = "default_report_title")]
    pub report_title: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: None,
            output_file: default_output_file(),
            notification_log: default_notification_log(),
            refresh_interval_secs: default_refresh_interval_secs(),
            notification_tolerance: default_notification_tolerance(),
            price_ceiling: default_price_ceiling(),
            request_timeout_secs: default_request_timeout_secs(),
            sort_order: default_sort_order(),
            report_title: default_report_title(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_quote_url")]
    pub quote_url: String,
    #[serde(default = "default_bond_list_url")]
    pub bond_list_url: String,
    #[serde(default = "default_bond_page_size")]
    pub bond_page_size: u32,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            quote_url: default_quote_url(),
            bond_list_url: default_bond_list_url(),
            bond_page_size: default_bond_page_size(),
            requests_per_second: default_requests_per_second(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PushConfig {
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,
    /// Name of the environment variable holding the access key.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            endpoint: default_push_endpoint(),
            token_env: default_token_env(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TargetConfig {
    pub id: String,
    pub name: String,
    pub source: String,
    pub code: Option<String>,
    #[serde(default = "default_convention")]
    pub convention: String,
    pub target_price: Option<f64>,
    #[serde(default)]
    pub note: String,
    #[serde(default = "default_schedule")]
    pub schedule: String,
}

/// Load and validate an `AppConfig` from a TOML file at `path`.
pub fn load(path: &Path) -> Result<AppConfig, Report<ConfigError>> {
    let content = std::fs::read_to_string(path)
        .change_context(ConfigError::ReadFile)
        .attach_with(|| format!("path: {}", path.display()))?;

    let config: AppConfig = toml::from_str(&content).change_context(ConfigError::Parse {
        reason: "invalid TOML syntax or schema mismatch".into(),
    })?;

    validate(&config)?;

    Ok(config)
}

const VALID_LOG_FORMATS: &[&str] = &["text", "json"];
const VALID_SORT_ORDERS: &[&str] = &["ratio", "distance"];

fn validate(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    validate_general(&config.general)?;
    validate_sources(&config.sources)?;
    validate_target_ids_unique(config)?;
    validate_target_kinds(config)?;
    Ok(())
}

fn invalid(field: String) -> Report<ConfigError> {
    Report::new(ConfigError::Validation { field })
}

fn validate_general(general: &GeneralConfig) -> Result<(), Report<ConfigError>> {
    if !VALID_LOG_FORMATS.contains(&general.log_format.as_str()) {
        return Err(invalid(format!(
            "general.log_format \"{}\" is not valid",
            general.log_format
        )));
    }
    if !VALID_SORT_ORDERS.contains(&general.sort_order.as_str()) {
        return Err(invalid(format!(
            "general.sort_order \"{}\" is not valid",
            general.sort_order
        )));
    }
    if general.refresh_interval_secs == 0 {
        return Err(invalid("general.refresh_interval_secs must be > 0".into()));
    }
    if general.request_timeout_secs == 0 {
        return Err(invalid("general.request_timeout_secs must be > 0".into()));
    }
    if !general.notification_tolerance.is_finite() || general.notification_tolerance < 0.0 {
        return Err(invalid(
            "general.notification_tolerance must be a finite value >= 0".into(),
        ));
    }
    if general.price_ceiling.is_nan() || general.price_ceiling <= 0.0 {
        return Err(invalid("general.price_ceiling must be > 0".into()));
    }
    Ok(())
}

fn validate_sources(sources: &SourcesConfig) -> Result<(), Report<ConfigError>> {
    if sources.requests_per_second == 0 {
        return Err(invalid("sources.requests_per_second must be > 0".into()));
    }
    if sources.bond_page_size == 0 {
        return Err(invalid("sources.bond_page_size must be > 0".into()));
    }
    Ok(())
}

fn validate_target_ids_unique(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    let mut seen = std::collections::HashSet::new();
    for target in &config.targets {
        if !seen.insert(target.id.as_str()) {
            return Err(invalid(format!("targets: duplicate id \"{}\"", target.id)));
        }
    }
    Ok(())
}

fn validate_target_kinds(config: &AppConfig) -> Result<(), Report<ConfigError>> {
    for target in &config.targets {
        let Some(source) = SourceKind::from_str(&target.source) else {
            return Err(invalid(format!(
                "targets[\"{}\"].source \"{}\" is not valid",
                target.id, target.source
            )));
        };

        if QuoteConvention::from_str(&target.convention).is_none() {
            return Err(invalid(format!(
                "targets[\"{}\"].convention \"{}\" is not valid",
                target.id, target.convention
            )));
        }

        if Schedule::from_str(&target.schedule).is_none() {
            return Err(invalid(format!(
                "targets[\"{}\"].schedule \"{}\" is not valid",
                target.id, target.schedule
            )));
        }

        let has_code = target.code.as_deref().is_some_and(|c| !c.trim().is_empty());
        if source == SourceKind::Quote && !has_code {
            return Err(invalid(format!(
                "targets[\"{}\"].code is required for source \"quote\"",
                target.id
            )));
        }

        if target.target_price.is_some_and(|p| !p.is_finite()) {
            return Err(invalid(format!(
                "targets[\"{}\"].target_price must be finite",
                target.id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> AppConfig {
        toml::from_str(toml).expect("parse failed")
    }

    #[test]
    fn valid_full_config_parses() {
        let toml = r#"
[general]
log_level = "debug"
log_format = "json"
log_file = "monitor.log"
output_file = "/tmp/out.html"
notification_log = "/tmp/log.json"
refresh_interval_secs = 60
notification_tolerance = 0.001
price_ceiling = 500.0
request_timeout_secs = 5
sort_order = "distance"

[sources]
quote_url = "http://localhost/list="
requests_per_second = 2

[push]
token_env = "MY_TOKEN"

[[targets]]
id = "SSEC"
name = "SSE Composite"
source = "quote"
code = "sh000001"
target_price = 3000.0
note = "index"

[[targets]]
id = "CB"
name = "Convertible bond average"
source = "bond_average"
target_price = 115.0
schedule = "trading_hours"
"#;
        let config = parse(toml);
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.general.log_file.as_deref(), Some("monitor.log"));
        assert_eq!(config.general.sort_order, "distance");
        assert_eq!(config.sources.requests_per_second, 2);
        assert_eq!(config.push.token_env, "MY_TOKEN");
        assert_eq!(config.targets.len(), 2);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn defaults_applied_when_sections_omitted() {
        let config = parse("");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.general.log_format, "text");
        assert_eq!(config.general.output_file, "index_price.html");
        assert_eq!(config.general.notification_log, "notification_log.json");
        assert_eq!(config.general.refresh_interval_secs, 300);
        assert_eq!(config.general.notification_tolerance, 0.0005);
        assert_eq!(config.general.request_timeout_secs, 10);
        assert_eq!(config.sources.bond_page_size, 1000);
        assert_eq!(config.push.token_env, "PUSHPLUS_TOKEN");
        assert!(config.targets.is_empty());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn target_defaults_applied() {
        let config = parse(
            r#"
[[targets]]
id = "X"
name = "X"
source = "quote"
code = "sz399975"
"#,
        );
        let target = &config.targets[0];
        assert_eq!(target.convention, "equity");
        assert_eq!(target.schedule, "always");
        assert_eq!(target.note, "");
        assert!(target.target_price.is_none());
    }

    #[test]
    fn duplicate_target_ids_rejected() {
        let config = parse(
            r#"
[[targets]]
id = "dup"
name = "a"
source = "quote"
code = "sh000001"

[[targets]]
id = "dup"
name = "b"
source = "quote"
code = "sz399975"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn quote_target_requires_code() {
        let config = parse(
            r#"
[[targets]]
id = "X"
name = "X"
source = "quote"
code = "  "
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_source_rejected() {
        let config = parse(
            r#"
[[targets]]
id = "X"
name = "X"
source = "yahoo"
code = "AAPL"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_convention_rejected() {
        let config = parse(
            r#"
[[targets]]
id = "X"
name = "X"
source = "quote"
code = "fx_susdcny"
convention = "fx"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn negative_tolerance_rejected() {
        let config = parse(
            r#"
[general]
notification_tolerance = -0.1
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn zero_refresh_interval_rejected() {
        let config = parse(
            r#"
[general]
refresh_interval_secs = 0
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn invalid_sort_order_rejected() {
        let config = parse(
            r#"
[general]
sort_order = "name"
"#,
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(&dir.path().join("missing.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[[targets]]
id = "SSEC"
name = "SSE Composite"
source = "quote"
code = "sh000001"
target_price = 3000.0
"#,
        )
        .unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.targets[0].id, "SSEC");
    }
}
