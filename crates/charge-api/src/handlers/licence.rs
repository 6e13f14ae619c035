use actix_web::{web, HttpResponse};
use charge_auth::AuthenticatedClient;
use charge_core::{traits::LedgerStore, AppError};
use charge_services::LedgerServices;
use tracing::{info, instrument};
use uuid::Uuid;

/// Delete a licence; the bill run reads `pending` until the work finishes
///
/// DELETE /v1/{regime}/bill-runs/{id}/licences/{licence_id}
#[instrument(skip(services, _client))]
pub async fn delete_licence<S: LedgerStore>(
    services: web::Data<LedgerServices<S>>,
    path: web::Path<(String, Uuid, Uuid)>,
    _client: AuthenticatedClient,
) -> Result<HttpResponse, AppError> {
    let (slug, bill_run_id, licence_id) = path.into_inner();
    let regime = services.regimes.find_by_slug(&slug).await?;

    services
        .deletion
        .delete_licence(&regime, bill_run_id, licence_id)
        .await?;

    info!(licence_id = %licence_id, "Licence deletion scheduled");
    Ok(HttpResponse::NoContent().finish())
}

pub fn configure<S: LedgerStore>(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/bill-runs/{id}/licences/{licence_id}",
        web::delete().to(delete_licence::<S>),
    );
}
