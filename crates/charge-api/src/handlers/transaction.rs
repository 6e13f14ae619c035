//! Transaction intake handler

use crate::dto::{ApiResponse, CreateTransactionRequest, TransactionResponse};
use actix_web::{web, HttpResponse};
use charge_auth::AuthenticatedClient;
use charge_core::{traits::LedgerStore, AppError};
use charge_services::LedgerServices;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Add a transaction to a bill run
///
/// POST /v1/{regime}/bill-runs/{id}/transactions
#[instrument(skip(services, client, req))]
pub async fn create_transaction<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    client: AuthenticatedClient,
    req: web::Json<CreateTransactionRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Transaction validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let (slug, bill_run_id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let transaction = services
        .transactions
        .create_transaction(&regime, bill_run_id, req.into_inner().into(), Some(client.client_id))
        .await?;

    info!(id = %transaction.id, bill_run_id = %bill_run_id, "Transaction added");

    Ok(HttpResponse::Created().json(ApiResponse::success(TransactionResponse::from(transaction))))
}

pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/bill-runs/{id}/transactions",
        web::post().to(create_transaction::<S>),
    );
}
