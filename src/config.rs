//! TOML configuration parsing and validation.
//!
//! Every field has a default, so an empty file (or [`Config::minimal`]) is a
//! working configuration for the offline commands. Credentials are never
//! stored in the file; `[salesforce]` only names the environment variables
//! that hold them.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::Deserialize;
use std::path::Path;

use crate::chart::ChartKind;
use sentiment_dash_core::period::PeriodSelector;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub salesforce: SalesforceConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SalesforceConfig {
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default = "default_sentiment_field")]
    pub sentiment_field: String,
    #[serde(default = "default_created_field")]
    pub created_field: String,
    #[serde(default = "default_username_env")]
    pub username_env: String,
    #[serde(default = "default_password_env")]
    pub password_env: String,
    #[serde(default = "default_security_token_env")]
    pub security_token_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SalesforceConfig {
    fn default() -> Self {
        Self {
            login_url: default_login_url(),
            api_version: default_api_version(),
            object: default_object(),
            sentiment_field: default_sentiment_field(),
            created_field: default_created_field(),
            username_env: default_username_env(),
            password_env: default_password_env(),
            security_token_env: default_security_token_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_login_url() -> String {
    "https://login.salesforce.com".to_string()
}
fn default_api_version() -> String {
    "59.0".to_string()
}
fn default_object() -> String {
    "Abstrakt_Summary__c".to_string()
}
fn default_sentiment_field() -> String {
    "Call_Sentiment__c".to_string()
}
fn default_created_field() -> String {
    "CreatedDate".to_string()
}
fn default_username_env() -> String {
    "SF_USERNAME_PRO".to_string()
}
fn default_password_env() -> String {
    "SF_PASSWORD_PRO".to_string()
}
fn default_security_token_env() -> String {
    "SF_SECURITY_TOKEN_PRO".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// IANA name of the reporting timezone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_period")]
    pub default_period: String,
    #[serde(default = "default_chart")]
    pub default_chart: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            default_period: default_period(),
            default_chart: default_chart(),
        }
    }
}

fn default_timezone() -> String {
    "America/New_York".to_string()
}
fn default_period() -> String {
    "week".to_string()
}
fn default_chart() -> String {
    "bar".to_string()
}

impl Config {
    /// Built-in defaults, used when no config file is present.
    pub fn minimal() -> Self {
        Self::default()
    }

    pub fn timezone(&self) -> Result<Tz> {
        self.report.timezone.parse::<Tz>().map_err(|e| {
            anyhow::anyhow!(
                "report.timezone '{}' is not a valid IANA timezone: {}",
                self.report.timezone,
                e
            )
        })
    }

    pub fn default_period(&self) -> Result<PeriodSelector> {
        self.report
            .default_period
            .parse::<PeriodSelector>()
            .with_context(|| format!("report.default_period '{}'", self.report.default_period))
    }

    pub fn default_chart(&self) -> Result<ChartKind> {
        self.report
            .default_chart
            .parse::<ChartKind>()
            .map_err(|e| anyhow::anyhow!("report.default_chart: {}", e))
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let sf = &config.salesforce;

    if sf.api_version.trim().is_empty() {
        bail!("salesforce.api_version must not be empty");
    }

    if !sf.login_url.starts_with("https://") && !sf.login_url.starts_with("http://") {
        bail!(
            "salesforce.login_url must be an http(s) URL, got '{}'",
            sf.login_url
        );
    }

    if sf.timeout_secs == 0 {
        bail!("salesforce.timeout_secs must be > 0");
    }

    for (key, value) in [
        ("salesforce.object", &sf.object),
        ("salesforce.sentiment_field", &sf.sentiment_field),
        ("salesforce.created_field", &sf.created_field),
    ] {
        if value.is_empty() || !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            bail!("{} must be a plain API name, got '{}'", key, value);
        }
    }

    config.timezone()?;
    config.default_period()?;
    config.default_chart()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.salesforce.object, "Abstrakt_Summary__c");
        assert_eq!(config.salesforce.username_env, "SF_USERNAME_PRO");
        assert_eq!(config.timezone().unwrap(), chrono_tz::America::New_York);
        assert_eq!(config.default_period().unwrap(), PeriodSelector::Week);
        assert_eq!(config.default_chart().unwrap(), ChartKind::Bar);
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
[salesforce]
api_version = "60.0"
timeout_secs = 5

[report]
timezone = "Europe/Berlin"
default_period = "last-90-days"
default_chart = "pie"
"#,
        )
        .unwrap();
        assert_eq!(config.salesforce.api_version, "60.0");
        assert_eq!(config.salesforce.timeout_secs, 5);
        assert_eq!(config.timezone().unwrap(), chrono_tz::Europe::Berlin);
        assert_eq!(
            config.default_period().unwrap(),
            PeriodSelector::LastNDays(90)
        );
        assert_eq!(config.default_chart().unwrap(), ChartKind::Pie);
    }

    #[test]
    fn test_rejects_bad_timezone() {
        let err = parse("[report]\ntimezone = \"Mars/Olympus\"\n").unwrap_err();
        assert!(err.to_string().contains("timezone"));
    }

    #[test]
    fn test_rejects_bad_period() {
        assert!(parse("[report]\ndefault_period = \"fortnight\"\n").is_err());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        assert!(parse("[salesforce]\ntimeout_secs = 0\n").is_err());
    }

    #[test]
    fn test_rejects_injected_field_name() {
        assert!(parse("[salesforce]\nobject = \"Account WHERE 1=1\"\n").is_err());
    }
}
