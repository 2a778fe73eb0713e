//! Core data models used throughout the dashboard.
//!
//! These types represent the call-summary records that flow from a record
//! source through the session into aggregation and charting.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call sentiment, the categorical field that is aggregated and charted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
    #[serde(rename = "N/A")]
    NA,
}

impl Sentiment {
    /// Every category, in the order the CRM picklist declares them.
    pub const ALL: [Sentiment; 4] = [
        Sentiment::Positive,
        Sentiment::Negative,
        Sentiment::Neutral,
        Sentiment::NA,
    ];

    /// Spelling used by the CRM and in query filters.
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
            Sentiment::NA => "N/A",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "n/a" | "na" => Ok(Sentiment::NA),
            other => Err(format!(
                "unknown sentiment '{}'. Use positive, negative, neutral, or n/a.",
                other
            )),
        }
    }
}

/// A single record pulled from the record source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Record identifier in the source system.
    pub id: String,
    pub sentiment: Sentiment,
    pub created_at: DateTime<Utc>,
}

impl Row {
    pub fn new(id: impl Into<String>, sentiment: Sentiment, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            sentiment,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_parse_case_insensitive() {
        assert_eq!("POSITIVE".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" neutral ".parse::<Sentiment>().unwrap(), Sentiment::Neutral);
        assert_eq!("n/a".parse::<Sentiment>().unwrap(), Sentiment::NA);
        assert_eq!("na".parse::<Sentiment>().unwrap(), Sentiment::NA);
        assert!("happy".parse::<Sentiment>().is_err());
    }

    #[test]
    fn test_sentiment_wire_spelling() {
        let json = serde_json::to_string(&Sentiment::NA).unwrap();
        assert_eq!(json, "\"N/A\"");
        let back: Sentiment = serde_json::from_str("\"Negative\"").unwrap();
        assert_eq!(back, Sentiment::Negative);
        assert_eq!(Sentiment::NA.to_string(), "N/A");
    }
}
