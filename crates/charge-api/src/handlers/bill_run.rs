//! Bill run handlers
//!
//! Creation, viewing and the generate/approve/send transitions.

use crate::dto::{ApiResponse, BillRunResponse, BillRunStatusResponse, CreateBillRunRequest};
use actix_web::{web, HttpResponse};
use charge_auth::AuthenticatedClient;
use charge_core::{traits::LedgerStore, AppError};
use charge_services::LedgerServices;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Create a bill run
///
/// POST /v1/{regime}/bill-runs
#[instrument(skip(services, client, req))]
pub async fn create_bill_run<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<String>,
    client: AuthenticatedClient,
    req: web::Json<CreateBillRunRequest>,
) -> Result<HttpResponse, AppError> {
    req.validate().map_err(|e| {
        warn!("Bill run creation validation failed: {}", e);
        AppError::Validation(e.to_string())
    })?;

    let regime = services.regimes.find_by_slug(&path).await?;
    let req = req.into_inner();

    let bill_run = services
        .bill_runs
        .create(&regime, &req.region, req.ruleset, Some(client.client_id))
        .await?;

    info!(id = %bill_run.id, number = ?bill_run.bill_run_number, "Bill run created");

    Ok(HttpResponse::Created().json(ApiResponse::success(BillRunResponse::from(bill_run))))
}

/// View a bill run with its invoices
///
/// GET /v1/{regime}/bill-runs/{id}
#[instrument(skip(services, _client))]
pub async fn get_bill_run<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let (bill_run, invoices) = services.bill_runs.view(&regime, id).await?;
    debug!(id = %id, invoices = invoices.len(), "Viewing bill run");

    Ok(HttpResponse::Ok().json(ApiResponse::success(BillRunResponse::with_invoices(
        bill_run, invoices,
    ))))
}

/// GET /v1/{regime}/bill-runs/{id}/status
#[instrument(skip(services, _client))]
pub async fn get_bill_run_status<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let bill_run = services.bill_runs.find(&regime, id).await?;

    Ok(HttpResponse::Ok().json(BillRunStatusResponse {
        status: bill_run.status,
    }))
}

/// PATCH /v1/{regime}/bill-runs/{id}/generate
#[instrument(skip(services, _client))]
pub async fn generate_bill_run<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let bill_run = services.bill_runs.generate(&regime, id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BillRunResponse::from(bill_run))))
}

/// PATCH /v1/{regime}/bill-runs/{id}/approve
#[instrument(skip(services, _client))]
pub async fn approve_bill_run<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let bill_run = services.bill_runs.approve(&regime, id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BillRunResponse::from(bill_run))))
}

/// PATCH /v1/{regime}/bill-runs/{id}/send
#[instrument(skip(services, _client))]
pub async fn send_bill_run<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    let bill_run = services.bill_runs.send(&regime, id).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(BillRunResponse::from(bill_run))))
}

/// Configure bill run routes
pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig) {
    cfg.route("/bill-runs", web::post().to(create_bill_run::<S>))
        .route("/bill-runs/{id}", web::get().to(get_bill_run::<S>))
        .route("/bill-runs/{id}/status", web::get().to(get_bill_run_status::<S>))
        .route("/bill-runs/{id}/generate", web::patch().to(generate_bill_run::<S>))
        .route("/bill-runs/{id}/approve", web::patch().to(approve_bill_run::<S>))
        .route("/bill-runs/{id}/send", web::patch().to(send_bill_run::<S>));
}
