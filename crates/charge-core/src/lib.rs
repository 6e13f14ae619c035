//! Charge Ledger Core Library
//!
//! Foundational types for the charge ledger:
//!
//! - Domain models (BillRun, Invoice, Licence, Transaction, SequenceCounter)
//! - Reference formatting and ledger arithmetic, both pure
//! - Storage and notifier traits
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod ledger;
pub mod models;
pub mod reference;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
