//! Lookup and presentation flow over the table, the model and the terminology service

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::config::ExplainerConfig;
use crate::core::dataset::InteractionTable;
use crate::core::errors::{ExplainerError, Result};
use crate::core::models::{Definition, DrugPair, InteractionRecord, LookupOutcome, TicketState};
use crate::core::simplifier::{HttpSimplifier, Simplifier};
use crate::core::terminology::TerminologySession;

/// Process-wide explainer; built once at startup and shared read-only
#[derive(Clone)]
pub struct Explainer {
    table: Arc<InteractionTable>,
    simplifier: Arc<dyn Simplifier>,
    terminology: Option<Arc<TerminologySession>>,
}

impl Explainer {
    pub fn new(
        table: InteractionTable,
        simplifier: Arc<dyn Simplifier>,
        terminology: Option<TerminologySession>,
    ) -> Self {
        Self {
            table: Arc::new(table),
            simplifier,
            terminology: terminology.map(Arc::new),
        }
    }

    /// Load the table and build the HTTP-backed collaborators from configuration
    pub fn from_config(config: &ExplainerConfig) -> Result<Self> {
        config.validate()?;

        let table = InteractionTable::load(&config.dataset_path, config.pair_match)?;
        let simplifier = Arc::new(HttpSimplifier::new(config)?);
        let terminology = TerminologySession::from_config(config)?;

        info!(
            "Explainer ready: {} pairs, definitions {}",
            table.len(),
            if terminology.is_some() { "enabled" } else { "disabled" }
        );

        Ok(Self::new(table, simplifier, terminology))
    }

    /// Selector entries, `"drug 1 + drug 2"`
    pub fn pairs(&self) -> Vec<String> {
        self.table.pairs()
    }

    /// Find the stored record for a pair; never calls the model
    pub fn lookup(&self, pair: &DrugPair) -> LookupOutcome<'_> {
        let outcome = self.table.lookup(pair);
        if outcome == LookupOutcome::NoMatch {
            debug!("No interaction for {}", pair);
        }
        outcome
    }

    /// Simplify the stored description of a pair.
    ///
    /// Returns `Ok(None)` when the pair has no record; the model is not called then.
    pub async fn simplify_record(
        &self,
        pair: &DrugPair,
    ) -> Result<Option<(InteractionRecord, String)>> {
        let Some(record) = self.lookup(pair).record().cloned() else {
            return Ok(None);
        };

        let simplified = self.simplifier.simplify(&record.description).await?;
        Ok(Some((record, simplified)))
    }

    /// Simplify user-supplied text; blank text is rejected without calling the model
    pub async fn simplify_text(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ExplainerError::EmptyInput);
        }
        self.simplifier.simplify(text).await
    }

    /// Definition for a vocabulary code, `None` when the service has no entry
    pub async fn definition(&self, code: &str) -> Result<Option<Definition>> {
        let session = self
            .terminology
            .as_ref()
            .ok_or(ExplainerError::TerminologyDisabled)?;
        session.definition(code).await
    }

    pub fn definitions_enabled(&self) -> bool {
        self.terminology.is_some()
    }

    /// Ticket state of the terminology session, `None` when definitions are disabled
    pub fn ticket_state(&self) -> Option<TicketState> {
        self.terminology.as_ref().map(|s| s.state())
    }

    /// When the session's granting ticket was obtained, if it has been
    pub fn ticket_issued_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.terminology.as_ref().and_then(|s| s.ticket_issued_at())
    }
}
