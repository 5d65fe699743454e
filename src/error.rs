use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::{geostore::GeostoreError, sql_parser::Rule};

pub type Result<T> = std::result::Result<T, ConvertError>;

pub const MALFORMED_QUERY: &str = "Malformed query";

pub const COUNT_STAR_WITH_COLUMNS: &str = "ArcGis does not support count(*) with more columns";

#[derive(Debug, Error)]
pub enum ConvertError {
    /// The input does not parse, or lacks the minimal from/select shape
    #[error("{0}")]
    MalformedQuery(String),

    /// Joins, several source tables or a statement kind other than select/delete
    #[error("{0}")]
    UnsupportedQueryShape(String),

    /// Parses and validates, but cannot be expressed in the target form
    #[error("{0}")]
    QueryNotValid(String),

    #[error("Geostore {0} not found")]
    GeostoreNotFound(String),

    #[error("Geostore lookup failed: {0}")]
    GeostoreLookupFailed(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ConvertError {
    pub fn malformed_query() -> Self {
        ConvertError::MalformedQuery(MALFORMED_QUERY.to_string())
    }

    /// HTTP status a web layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ConvertError::GeostoreNotFound(_) => 404,
            ConvertError::GeostoreLookupFailed(_) => 502,
            _ => 400,
        }
    }
}

impl From<pest::error::Error<Rule>> for ConvertError {
    fn from(error: pest::error::Error<Rule>) -> Self {
        debug!(error = %error, "SQL parse failure");
        ConvertError::malformed_query()
    }
}

impl From<GeostoreError> for ConvertError {
    fn from(error: GeostoreError) -> Self {
        match error {
            GeostoreError::NotFound(id) => ConvertError::GeostoreNotFound(id),
            other => ConvertError::GeostoreLookupFailed(other.to_string()),
        }
    }
}

/// Error value handed back to callers instead of a conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: bool,
    pub message: String,
}

impl From<&ConvertError> for ErrorResponse {
    fn from(error: &ConvertError) -> Self {
        ErrorResponse {
            error: true,
            message: error.to_string(),
        }
    }
}
