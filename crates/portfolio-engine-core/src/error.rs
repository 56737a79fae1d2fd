use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PortfolioEngineError {
    #[error("Insufficient assets: at least {required} symbols required, got {actual}")]
    InsufficientAssets { required: usize, actual: usize },

    #[error("Too many assets: at most {max} symbols allowed, got {actual}")]
    TooManyAssets { max: usize, actual: usize },

    #[error("Insufficient history for {symbol}: at least {required} prices required, got {actual}")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        actual: usize,
    },

    #[error("Invalid portfolio value: {0} (must be positive and at most 1e15)")]
    InvalidPortfolioValue(Decimal),

    #[error("Invalid input: {field}: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Optimization diverged: {method} did not converge after {iterations} iterations (delta: {last_delta})")]
    OptimizationDiverged {
        method: String,
        iterations: u32,
        last_delta: Decimal,
    },

    #[error("Market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for PortfolioEngineError {
    fn from(e: serde_json::Error) -> Self {
        PortfolioEngineError::SerializationError(e.to_string())
    }
}

/// HTTP-equivalent status family of an error at the request boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    ClientError,
    ServiceUnavailable,
    InternalError,
}

impl ErrorCategory {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorCategory::ClientError => 400,
            ErrorCategory::ServiceUnavailable => 503,
            ErrorCategory::InternalError => 500,
        }
    }
}

impl PortfolioEngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PortfolioEngineError::DataUnavailable { .. } => ErrorCategory::ServiceUnavailable,
            PortfolioEngineError::OptimizationDiverged { .. } => ErrorCategory::InternalError,
            _ => ErrorCategory::ClientError,
        }
    }

    /// Stable machine-readable name for the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            PortfolioEngineError::InsufficientAssets { .. } => "InsufficientAssetsError",
            PortfolioEngineError::TooManyAssets { .. } => "TooManyAssetsError",
            PortfolioEngineError::InsufficientHistory { .. } => "InsufficientHistoryError",
            PortfolioEngineError::InvalidPortfolioValue(_) => "InvalidPortfolioValueError",
            PortfolioEngineError::InvalidInput { .. } => "InvalidInputError",
            PortfolioEngineError::OptimizationDiverged { .. } => "OptimizationDivergedError",
            PortfolioEngineError::DataUnavailable { .. } => "DataUnavailableError",
            PortfolioEngineError::SerializationError(_) => "SerializationError",
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.kind().to_string(),
            message: self.to_string(),
            status: self.category().status_code(),
        }
    }
}

/// Structured error body returned across the request boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status: u16,
}
