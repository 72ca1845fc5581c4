//! Custom error types for explainer operations

use thiserror::Error;

/// Errors surfaced by the explainer, its model wrapper and the terminology client
#[derive(Error, Debug)]
pub enum ExplainerError {
    /// Manual simplification was requested with blank text
    #[error("Please enter a valid description.")]
    EmptyInput,

    /// Caller supplied something unusable (malformed pair, blank code)
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
    },

    /// The simplification model could not produce an answer
    #[error("Simplification unavailable: {message}")]
    SimplifierUnavailable {
        message: String,
    },

    /// The terminology service could not be reached or answered unexpectedly
    #[error("Definition service unreachable: {message}")]
    TerminologyUnreachable {
        message: String,
    },

    /// The API key was rejected or no ticket could be read from the response
    #[error("Terminology authentication failed: {message}")]
    TerminologyAuth {
        message: String,
    },

    /// No API key configured, definitions are switched off
    #[error("Definition lookups are disabled: no UMLS API key configured")]
    TerminologyDisabled,

    /// Remote API answered with a non-success status
    #[error("API error: {status} - {message}")]
    ApiError {
        status: u16,
        message: String,
    },

    /// The interaction table could not be loaded
    #[error("Dataset error: {path} - {message}")]
    Dataset {
        path: String,
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        message: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Reqwest error
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl ExplainerError {
    /// Whether the failure belongs to an upstream service rather than the caller
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ExplainerError::SimplifierUnavailable { .. }
                | ExplainerError::TerminologyUnreachable { .. }
                | ExplainerError::TerminologyAuth { .. }
                | ExplainerError::ApiError { .. }
                | ExplainerError::HttpError(_)
        )
    }
}

/// Result type for explainer operations
pub type Result<T> = std::result::Result<T, ExplainerError>;
