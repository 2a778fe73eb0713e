//! Salesforce record source.
//!
//! Logs in once per process with the SOAP `login` call (username, password
//! and security token from the environment), then runs a SOQL query through
//! the REST API for every fetch, following `nextRecordsUrl` until the result
//! set is complete.
//!
//! # Configuration
//!
//! ```toml
//! [salesforce]
//! login_url = "https://login.salesforce.com"
//! api_version = "59.0"
//! object = "Abstrakt_Summary__c"
//! sentiment_field = "Call_Sentiment__c"
//! created_field = "CreatedDate"
//! username_env = "SF_USERNAME_PRO"
//! password_env = "SF_PASSWORD_PRO"
//! security_token_env = "SF_SECURITY_TOKEN_PRO"
//! timeout_secs = 30
//! ```
//!
//! Each fetch is a single attempt. The login session is cached for the life
//! of the source and is not refreshed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use crate::config::SalesforceConfig;
use sentiment_dash_core::models::{Row, Sentiment};
use sentiment_dash_core::source::{RecordBatch, RecordSource};
use sentiment_dash_core::SourceError;

/// Login credentials read from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub security_token: String,
}

impl Credentials {
    pub fn from_env(config: &SalesforceConfig) -> Result<Self, SourceError> {
        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| SourceError::Config(format!("environment variable {} not set", name)))
        };
        Ok(Self {
            username: read(&config.username_env)?,
            password: read(&config.password_env)?,
            security_token: read(&config.security_token_env)?,
        })
    }
}

/// An authenticated API session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfSession {
    pub session_id: String,
    /// Scheme and host of the org, e.g. `https://acme.my.salesforce.com`.
    pub instance_url: String,
}

/// [`RecordSource`] backed by a Salesforce org.
pub struct SalesforceSource {
    config: SalesforceConfig,
    client: reqwest::Client,
    session: OnceCell<SfSession>,
}

impl SalesforceSource {
    pub fn new(config: &SalesforceConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config: config.clone(),
            client,
            session: OnceCell::new(),
        })
    }

    /// Whether a login has already succeeded.
    pub fn is_authenticated(&self) -> bool {
        self.session.initialized()
    }

    async fn session(&self) -> Result<&SfSession, SourceError> {
        self.session.get_or_try_init(|| self.login()).await
    }

    async fn login(&self) -> Result<SfSession, SourceError> {
        let creds = Credentials::from_env(&self.config)?;
        let url = format!(
            "{}/services/Soap/u/{}",
            self.config.login_url.trim_end_matches('/'),
            self.config.api_version
        );

        tracing::debug!(url = %url, user = %creds.username, "salesforce login");

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "text/xml; charset=UTF-8")
            .header("SOAPAction", "login")
            .body(login_envelope(&creds))
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let session = parse_login_response(&body)?;
        if !status.is_success() {
            return Err(SourceError::Auth(format!("login returned HTTP {}", status)));
        }

        tracing::info!(instance = %session.instance_url, "salesforce login ok");
        Ok(session)
    }

    async fn query_page(
        &self,
        session: &SfSession,
        url: &str,
        soql: Option<&str>,
    ) -> Result<QueryPage, SourceError> {
        let mut request = self.client.get(url).bearer_auth(&session.session_id);
        if let Some(q) = soql {
            request = request.query(&[("q", q)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 401 {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Auth(format!("session rejected: {}", body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Http(format!("query returned {}: {}", status, body)));
        }

        response
            .json::<QueryPage>()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RecordSource for SalesforceSource {
    fn name(&self) -> &str {
        "salesforce"
    }

    async fn fetch_records(
        &self,
        start_iso: &str,
        end_iso: &str,
    ) -> Result<RecordBatch, SourceError> {
        let session = self.session().await?;
        let soql = build_soql(&self.config, start_iso, end_iso);

        let first_url = format!(
            "{}/services/data/v{}/query",
            session.instance_url, self.config.api_version
        );

        let mut page = self.query_page(session, &first_url, Some(&soql)).await?;
        let mut rows = Vec::new();
        let mut pages = 1usize;

        loop {
            rows.extend(decode_records(&self.config, &page.records)?);
            match (page.done, page.next_records_url.take()) {
                (false, Some(next)) => {
                    let url = format!("{}{}", session.instance_url, next);
                    page = self.query_page(session, &url, None).await?;
                    pages += 1;
                }
                _ => break,
            }
        }

        tracing::info!(rows = rows.len(), pages, "salesforce query complete");

        Ok(RecordBatch {
            rows,
            query_text: soql,
        })
    }
}

/// One page of a REST `query` response.
#[derive(Debug, Deserialize)]
struct QueryPage {
    done: bool,
    #[serde(rename = "nextRecordsUrl")]
    next_records_url: Option<String>,
    #[serde(default)]
    records: Vec<Map<String, Value>>,
}

/// SOQL for rows with a known sentiment created inside the range.
pub fn build_soql(config: &SalesforceConfig, start_iso: &str, end_iso: &str) -> String {
    let allowed: Vec<String> = Sentiment::ALL
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect();
    format!(
        "SELECT Id, {sentiment}, {created} FROM {object} \
         WHERE {sentiment} IN ({allowed}) \
         AND {created} >= {start} AND {created} <= {end} \
         ORDER BY {created}",
        sentiment = config.sentiment_field,
        created = config.created_field,
        object = config.object,
        allowed = allowed.join(", "),
        start = start_iso,
        end = end_iso,
    )
}

/// Turn raw query records into rows, skipping ones without a usable sentiment.
fn decode_records(
    config: &SalesforceConfig,
    records: &[Map<String, Value>],
) -> Result<Vec<Row>, SourceError> {
    let mut rows = Vec::with_capacity(records.len());

    for record in records {
        let id = record
            .get("Id")
            .and_then(Value::as_str)
            .ok_or_else(|| SourceError::Decode("record without Id".to_string()))?;

        let sentiment = match record
            .get(&config.sentiment_field)
            .and_then(Value::as_str)
            .map(str::parse::<Sentiment>)
        {
            Some(Ok(s)) => s,
            Some(Err(e)) => {
                tracing::debug!(id, error = %e, "skipping record");
                continue;
            }
            None => {
                tracing::debug!(id, "skipping record with empty sentiment");
                continue;
            }
        };

        let created_raw = record
            .get(&config.created_field)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SourceError::Decode(format!("record {} has no {}", id, config.created_field))
            })?;

        rows.push(Row::new(id, sentiment, parse_sf_datetime(created_raw)?));
    }

    Ok(rows)
}

/// Parse Salesforce's `2024-06-12T14:03:22.000+0000` as well as RFC 3339.
fn parse_sf_datetime(raw: &str) -> Result<DateTime<Utc>, SourceError> {
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| SourceError::Decode(format!("bad timestamp '{}': {}", raw, e)))
}

fn login_envelope(creds: &Credentials) -> String {
    use quick_xml::escape::escape;

    let password = format!("{}{}", creds.password, creds.security_token);
    format!(
        r#"<?xml version="1.0" encoding="utf-8" ?>
<env:Envelope xmlns:xsd="http://www.w3.org/2001/XMLSchema"
    xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
    xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"
    xmlns:urn="urn:partner.soap.sforce.com">
  <env:Body>
    <urn:login>
      <urn:username>{}</urn:username>
      <urn:password>{}</urn:password>
    </urn:login>
  </env:Body>
</env:Envelope>"#,
        escape(creds.username.as_str()),
        escape(password.as_str())
    )
}

/// Extract the session from a SOAP `loginResponse`, or the fault message.
fn parse_login_response(xml: &str) -> Result<SfSession, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut current: Option<Vec<u8>> = None;
    let mut session_id = None;
    let mut server_url = None;
    let mut fault = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => current = Some(e.local_name().as_ref().to_vec()),
            Ok(Event::End(_)) => current = None,
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Decode(e.to_string()))?
                    .trim()
                    .to_string();
                match current.as_deref() {
                    Some(b"sessionId") => session_id = Some(text),
                    Some(b"serverUrl") => server_url = Some(text),
                    Some(b"faultstring") => fault = Some(text),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SourceError::Decode(format!(
                    "login response at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
        }
    }

    if let Some(message) = fault {
        return Err(SourceError::Auth(message));
    }

    match (session_id, server_url) {
        (Some(session_id), Some(server_url)) => Ok(SfSession {
            session_id,
            instance_url: instance_from_server_url(&server_url)?,
        }),
        _ => Err(SourceError::Decode(
            "login response missing sessionId or serverUrl".to_string(),
        )),
    }
}

/// `https://host/services/Soap/u/59.0/00D...` → `https://host`.
fn instance_from_server_url(server_url: &str) -> Result<String, SourceError> {
    let rest = server_url
        .strip_prefix("https://")
        .or_else(|| server_url.strip_prefix("http://"))
        .ok_or_else(|| SourceError::Decode(format!("unexpected serverUrl '{}'", server_url)))?;
    let host_len = rest.find('/').unwrap_or(rest.len());
    let scheme_len = server_url.len() - rest.len();
    Ok(server_url[..scheme_len + host_len].to_string())
}
