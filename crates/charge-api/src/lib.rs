//! API layer for the charge ledger
//!
//! HTTP handlers for bill runs, transactions, invoices and licences. Every
//! handler is generic over the [`LedgerStore`](charge_core::traits::LedgerStore)
//! behind the `LedgerServices` registered as app data, so the same routes run
//! against PostgreSQL in production and the in-memory store in tests.

#![forbid(unsafe_code)]

pub mod dto;
pub mod handlers;

pub use dto::ApiResponse;
pub use handlers::{configure, json_config};
