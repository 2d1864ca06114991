use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FaqError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Collection '{0}' has no documents")]
    EmptyCollection(String),

    #[error("Malformed vector store response: {0}")]
    MalformedStoreResponse(String),

    #[error("Model server error: {0}")]
    Generation(String),

    #[error("Invalid verdict: {0}")]
    InvalidVerdict(String),

    #[error("Judge unavailable after {attempts} attempt(s): {source}")]
    JudgeUnavailable {
        attempts: u32,
        #[source]
        source: Box<FaqError>,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl FaqError {
    /// Failures worth another attempt against the same upstream.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FaqError::Http(_)
                | FaqError::Serde(_)
                | FaqError::Generation(_)
                | FaqError::InvalidVerdict(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, FaqError>;
