//! Invoice handlers
//!
//! Deletion and rebilling both finish in the background; the response only
//! confirms the request was accepted.

use crate::dto::{ApiResponse, RebillResponse};
use actix_web::{web, HttpResponse};
use charge_auth::AuthenticatedClient;
use charge_core::{traits::LedgerStore, AppError};
use charge_services::LedgerServices;
use tracing::{info, instrument};
use uuid::Uuid;

/// DELETE /v1/{regime}/bill-runs/{id}/invoices/{invoice_id}
#[instrument(skip(services, _client))]
pub async fn delete_invoice<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, bill_run_id, invoice_id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    services
        .deletion
        .delete_invoice(&regime, bill_run_id, invoice_id)
        .await?;

    info!(invoice_id = %invoice_id, "Invoice deletion scheduled");
    Ok(HttpResponse::NoContent().finish())
}

/// Rebill an invoice onto this bill run
///
/// PATCH /v1/{regime}/bill-runs/{id}/invoices/{invoice_id}/rebill
#[instrument(skip(services, client))]
pub async fn rebill_invoice<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid, Uuid)>,
    client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, bill_run_id, invoice_id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let (rebilled, _copy) = services
        .rebilling
        .rebill_invoice(&regime, bill_run_id, invoice_id, Some(client.client_id))
        .await?;

    info!(invoice_id = %invoice_id, "Invoice rebilling scheduled");
    Ok(HttpResponse::Created().json(ApiResponse::success(RebillResponse::from(&rebilled))))
}

pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/bill-runs/{id}/invoices/{invoice_id}",
        web::delete().to(delete_invoice::<S>),
    )
    .route(
        "/bill-runs/{id}/invoices/{invoice_id}/rebill",
        web::patch().to(rebill_invoice::<S>),
    );
}
