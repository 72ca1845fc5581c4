//! Core data models for interaction lookups

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::errors::{ExplainerError, Result};

/// Separator used when a drug pair is shown as a single string
pub const PAIR_SEPARATOR: &str = " + ";

/// Notice shown when the selected pair has no interaction record
pub const NO_MATCH_NOTICE: &str = "No interaction found for the selected pair.";

/// One row of the interaction table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub drug_1: String,
    pub drug_2: String,
    pub description: String,
    pub cui_1: Option<String>,
    pub cui_2: Option<String>,
}

impl InteractionRecord {
    /// The pair this record is keyed by, in stored order
    pub fn pair(&self) -> DrugPair {
        DrugPair::new(self.drug_1.clone(), self.drug_2.clone())
    }

    /// Drug names paired with their codes, skipping drugs with no code
    pub fn coded_drugs(&self) -> Vec<(&str, &str)> {
        [
            (self.drug_1.as_str(), self.cui_1.as_deref()),
            (self.drug_2.as_str(), self.cui_2.as_deref()),
        ]
        .into_iter()
        .filter_map(|(drug, cui)| cui.map(|c| (drug, c)))
        .collect()
    }
}

/// Two drug names used as a lookup key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DrugPair {
    pub first: String,
    pub second: String,
}

impl DrugPair {
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Parse `"Drug A + Drug B"`
    pub fn parse(s: &str) -> Result<Self> {
        let (first, second) = s.split_once(PAIR_SEPARATOR).ok_or_else(|| {
            ExplainerError::InvalidInput {
                message: format!("expected '<drug 1>{}<drug 2>', got '{}'", PAIR_SEPARATOR, s),
            }
        })?;

        let (first, second) = (first.trim(), second.trim());
        if first.is_empty() || second.is_empty() {
            return Err(ExplainerError::InvalidInput {
                message: format!("both drug names are required, got '{}'", s),
            });
        }

        Ok(Self::new(first, second))
    }

    pub fn reversed(&self) -> Self {
        Self::new(self.second.clone(), self.first.clone())
    }
}

impl fmt::Display for DrugPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.first, PAIR_SEPARATOR, self.second)
    }
}

/// How a selected pair is matched against stored rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairMatch {
    /// Drug 1 and drug 2 must match positionally
    #[default]
    Ordered,
    /// Fall back to the reversed order when the stored order misses
    Unordered,
}

impl std::str::FromStr for PairMatch {
    type Err = ExplainerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ordered" => Ok(PairMatch::Ordered),
            "unordered" => Ok(PairMatch::Unordered),
            other => Err(ExplainerError::Config {
                message: format!("unknown pair match mode: {}", other),
            }),
        }
    }
}

/// Result of looking a pair up in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupOutcome<'a> {
    Found(&'a InteractionRecord),
    NoMatch,
}

impl<'a> LookupOutcome<'a> {
    pub fn record(&self) -> Option<&'a InteractionRecord> {
        match self {
            LookupOutcome::Found(record) => Some(record),
            LookupOutcome::NoMatch => None,
        }
    }
}

/// Ticket-granting ticket: the URL service tickets are minted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantingTicket {
    url: String,
    pub issued_at: chrono::DateTime<chrono::Utc>,
}

impl GrantingTicket {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            issued_at: chrono::Utc::now(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Single-use credential presented on one content request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceTicket {
    value: String,
}

impl ServiceTicket {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

/// Whether the terminology session holds a granting ticket yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    NoTicket,
    Ticketed,
}

/// A human-readable definition for a vocabulary code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub text: String,
    /// Source vocabulary that supplied the text, when reported
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_parse_and_display() {
        let pair = DrugPair::parse("Warfarin + Aspirin").unwrap();
        assert_eq!(pair.first, "Warfarin");
        assert_eq!(pair.second, "Aspirin");
        assert_eq!(pair.to_string(), "Warfarin + Aspirin");
        assert_eq!(pair.reversed().to_string(), "Aspirin + Warfarin");
    }

    #[test]
    fn test_pair_parse_rejects_malformed() {
        assert!(DrugPair::parse("Warfarin").is_err());
        assert!(DrugPair::parse(" + Aspirin").is_err());
    }

    #[test]
    fn test_coded_drugs_skips_missing_codes() {
        let record = InteractionRecord {
            drug_1: "DrugA".to_string(),
            drug_2: "DrugB".to_string(),
            description: "May increase bleeding risk".to_string(),
            cui_1: Some("CUI001".to_string()),
            cui_2: None,
        };
        assert_eq!(record.coded_drugs(), vec![("DrugA", "CUI001")]);
    }

    #[test]
    fn test_pair_match_from_str() {
        assert_eq!("Ordered".parse::<PairMatch>().unwrap(), PairMatch::Ordered);
        assert_eq!("unordered".parse::<PairMatch>().unwrap(), PairMatch::Unordered);
        assert!("sideways".parse::<PairMatch>().is_err());
    }
}
