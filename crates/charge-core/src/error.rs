//! Unified error handling for the charge ledger
//!
//! One error type covers every failure in the ledger engine. It implements
//! `ResponseError` so the HTTP boundary can surface guard and validation
//! failures unchanged.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ==================== Ledger Errors ====================
    #[error("Bill run not found: {0}")]
    BillRunNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    #[error("Licence not found: {0}")]
    LicenceNotFound(String),

    #[error("Regime not found: {0}")]
    RegimeNotFound(String),

    #[error("No sequence counter for regime {regime} and region {region}")]
    SequenceCounterNotFound { regime: String, region: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid ruleset: {0}")]
    InvalidRuleset(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unprocessable: {0}")]
    DataValidation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::InvalidRuleset(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::BillRunNotFound(_)
            | AppError::InvoiceNotFound(_)
            | AppError::LicenceNotFound(_)
            | AppError::RegimeNotFound(_)
            | AppError::SequenceCounterNotFound { .. }
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_) | AppError::InvalidState(_) => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::DataValidation(_) => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::BillRunNotFound(_) => "bill_run_not_found",
            AppError::InvoiceNotFound(_) => "invoice_not_found",
            AppError::LicenceNotFound(_) => "licence_not_found",
            AppError::RegimeNotFound(_) => "regime_not_found",
            AppError::SequenceCounterNotFound { .. } => "sequence_counter_not_found",
            AppError::InvalidState(_) => "invalid_state",
            AppError::InvalidRuleset(_) => "invalid_ruleset",
            AppError::Validation(_) => "validation_error",
            AppError::DataValidation(_) => "unprocessable",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }

    /// True for the not-found family of errors
    pub fn is_not_found(&self) -> bool {
        self.status_code() == StatusCode::NOT_FOUND
    }

    /// True for state-machine guard violations
    pub fn is_conflict(&self) -> bool {
        matches!(self, AppError::Conflict(_) | AppError::InvalidState(_))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Row not found".to_string()),
            other => AppError::Database(other.to_string()),
        }
    }
}
