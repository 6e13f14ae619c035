//! HTTP request handlers
//!
//! Ledger routes live under `/v1/{regime}`; the regime slug is resolved on
//! every request and scopes every bill run lookup.

pub mod bill_run;
pub mod health;
pub mod invoice;
pub mod licence;
pub mod transaction;

use actix_web::web;
use charge_core::{traits::LedgerStore, AppError};
use tracing::warn;

/// Register every route for a store type
pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::health_check)).service(
        web::scope("/v1/{regime}")
            .configure(bill_run::configure::<S>)
            .configure(transaction::configure::<S>)
            .configure(invoice::configure::<S>)
            .configure(licence::configure::<S>),
    );
}

/// JSON extractor config rendering body errors as `AppError::Validation`
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        warn!("Rejected request body: {}", err);
        AppError::Validation(err.to_string()).into()
    })
}
