//! Interaction table loaded once from a flat CSV file

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::errors::{ExplainerError, Result};
use crate::core::models::{DrugPair, InteractionRecord, LookupOutcome, PairMatch, PAIR_SEPARATOR};

/// Raw CSV row, column names as they appear in the source table
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Drug_1")]
    drug_1: String,
    #[serde(rename = "Drug_2")]
    drug_2: String,
    #[serde(rename = "Interaction_Description")]
    description: String,
    #[serde(default)]
    cui_1: Option<String>,
    #[serde(default)]
    cui_2: Option<String>,
}

/// Blank cells count as missing codes
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Decode ISO-8859-1 bytes; every byte is its own code point
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Read-only lookup table of drug-pair interactions
#[derive(Debug, Clone)]
pub struct InteractionTable {
    records: Vec<InteractionRecord>,
    index: HashMap<DrugPair, usize>,
    pair_match: PairMatch,
}

impl InteractionTable {
    /// Build a table from records; the first record for a pair wins
    pub fn from_records(records: Vec<InteractionRecord>, pair_match: PairMatch) -> Self {
        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.contains_key(&record.pair()) {
                debug!("Duplicate row for {}, keeping the first", record.pair());
                continue;
            }
            index.insert(record.pair(), i);
        }

        Self {
            records,
            index,
            pair_match,
        }
    }

    /// Load the table from an ISO-8859-1 encoded CSV file
    pub fn load<P: AsRef<Path>>(path: P, pair_match: PairMatch) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| ExplainerError::Dataset {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let table = Self::from_csv_str(&decode_latin1(&bytes), pair_match).map_err(|e| {
            ExplainerError::Dataset {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;

        info!(
            "Loaded {} interaction records ({} pairs) from {}",
            table.records.len(),
            table.index.len(),
            path.display()
        );

        Ok(table)
    }

    /// Parse CSV text with a header row
    pub fn from_csv_str(content: &str, pair_match: PairMatch) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<RawRow>().enumerate() {
            let row = row?;
            if row.drug_1.is_empty() || row.drug_2.is_empty() {
                warn!("Skipping row {} with a missing drug name", line + 2);
                continue;
            }
            // the selector string could not be split back into this pair
            if row.drug_1.contains(PAIR_SEPARATOR) || row.drug_2.contains(PAIR_SEPARATOR) {
                warn!(
                    "Skipping row {}: drug name contains '{}'",
                    line + 2,
                    PAIR_SEPARATOR.trim()
                );
                continue;
            }

            records.push(InteractionRecord {
                drug_1: row.drug_1,
                drug_2: row.drug_2,
                description: row.description,
                cui_1: non_blank(row.cui_1),
                cui_2: non_blank(row.cui_2),
            });
        }

        Ok(Self::from_records(records, pair_match))
    }

    /// Sorted, de-duplicated `"drug 1 + drug 2"` strings for the selector
    pub fn pairs(&self) -> Vec<String> {
        let mut pairs: Vec<String> = self.index.keys().map(|p| p.to_string()).collect();
        pairs.sort();
        pairs
    }

    /// Find the record for a pair
    pub fn lookup(&self, pair: &DrugPair) -> LookupOutcome<'_> {
        let hit = self.index.get(pair).or_else(|| match self.pair_match {
            PairMatch::Ordered => None,
            PairMatch::Unordered => self.index.get(&pair.reversed()),
        });

        match hit {
            Some(&i) => LookupOutcome::Found(&self.records[i]),
            None => LookupOutcome::NoMatch,
        }
    }

    /// Number of distinct pairs
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}
