use crate::types::{FeeGroupId, Year};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TuitionError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("No fee group found for course '{course}' in branch '{branch}'")]
    FeeGroupNotFound { course: String, branch: String },

    #[error("No standard tariff found for year {year} and fee group {fee_group_id}")]
    StandardTariffNotFound { year: Year, fee_group_id: FeeGroupId },

    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{operation} failed and was rolled back: {source}")]
    Transaction {
        operation: &'static str,
        #[source]
        source:    Box<TuitionError>,
    },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not allowed: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TuitionError {
    /// Wrap a failure raised inside an atomic operation.
    pub fn transaction(operation: &'static str, source: TuitionError) -> Self {
        Self::Transaction { operation, source: Box::new(source) }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::FeeGroupNotFound { .. }
                | Self::StandardTariffNotFound { .. }
                | Self::NotFound { .. }
        )
    }

    /// HTTP-equivalent status used by the command runner.
    /// A rolled-back transaction reports the status of its cause.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Transaction { source, .. } => source.status_code(),
            e if e.is_not_found()   => 404,
            Self::Validation(_)     => 400,
            Self::Conflict(_)       => 409,
            Self::Forbidden(_)      => 403,
            _                       => 500,
        }
    }
}

pub type TuitionResult<T> = Result<T, TuitionError>;
