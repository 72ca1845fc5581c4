//! Drug Interaction Explainer
//!
//! Looks up drug-pair interaction descriptions in a static table, rewrites
//! them in plain language through a pretrained text-to-text model, and
//! annotates the drugs with UMLS concept codes and definitions.

#![forbid(unsafe_code)]

pub mod cli;
pub mod core;
pub mod server;

// Re-export key types for convenience
pub use self::core::{
    config::ExplainerConfig,
    dataset::InteractionTable,
    errors::{ExplainerError, Result},
    explainer::Explainer,
    models::{
        Definition, DrugPair, GrantingTicket, InteractionRecord, LookupOutcome, PairMatch,
        ServiceTicket, TicketState,
    },
    simplifier::{HttpSimplifier, Simplifier},
    terminology::{TerminologyClient, TerminologySession},
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
