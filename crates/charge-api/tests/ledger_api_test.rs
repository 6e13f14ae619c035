//! HTTP tests for the ledger routes, backed by the in-memory store

use actix_web::{http::StatusCode, test, web, App};
use charge_api::{configure, json_config};
use charge_auth::{Claims, JwtService};
use charge_core::config::BillingConfig;
use charge_db::MemoryLedgerStore;
use charge_services::{LedgerServices, RecordingNotifier};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

struct Context {
    services: web::Data<LedgerServices<MemoryLedgerStore>>,
    jwt: web::Data<Arc<JwtService>>,
    token: String,
}

impl Context {
    fn auth(&self) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", self.token))
    }
}

async fn context() -> Context {
    let store = Arc::new(MemoryLedgerStore::new());
    store.seed_regime("wrls", "Water Resources", 0).await;

    let services = LedgerServices::new(store, BillingConfig::default(), Arc::new(RecordingNotifier::new()));
    let jwt = Arc::new(JwtService::new("api-test-secret", 3600));
    let token = jwt.create_token(&Claims::new("client-a")).unwrap();

    Context {
        services: web::Data::new(services),
        jwt: web::Data::new(jwt),
        token,
    }
}

macro_rules! init_app {
    ($ctx:expr) => {
        test::init_service(
            App::new()
                .app_data($ctx.services.clone())
                .app_data($ctx.jwt.clone())
                .app_data(json_config())
                .configure(configure::<MemoryLedgerStore>),
        )
        .await
    };
}

fn transaction(customer: &str, licence: &str, value: i64) -> Value {
    json!({
        "region": "A",
        "ruleset": "presroc",
        "customerReference": customer,
        "licenceNumber": licence,
        "financialYear": 2021,
        "chargeValue": value,
    })
}

#[actix_web::test]
async fn test_health_needs_no_token() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "healthy");
}

#[actix_web::test]
async fn test_requests_without_token_are_unauthorized() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .set_json(json!({ "region": "A" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn test_unknown_regime_is_not_found() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/nope/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "region": "A" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], 404);
}

#[actix_web::test]
async fn test_malformed_body_is_bad_request() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "ruleset": "sroc" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_bill_run_lifecycle() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "region": "A", "ruleset": "presroc" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["billRunNumber"], 1);
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let empty_generate = test::TestRequest::patch()
        .uri(&format!("/v1/wrls/bill-runs/{}/generate", id))
        .insert_header(ctx.auth())
        .to_request();
    let resp = test::call_service(&app, empty_generate).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let req = test::TestRequest::post()
        .uri(&format!("/v1/wrls/bill-runs/{}/transactions", id))
        .insert_header(ctx.auth())
        .set_json(transaction("CUST1", "LIC/1", 1500))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    for step in ["generate", "approve"] {
        let req = test::TestRequest::patch()
            .uri(&format!("/v1/wrls/bill-runs/{}/{}", id, step))
            .insert_header(ctx.auth())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK, "{} failed", step);
    }

    let req = test::TestRequest::patch()
        .uri(&format!("/v1/wrls/bill-runs/{}/send", id))
        .insert_header(ctx.auth())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["data"]["status"], "sending");
    assert_eq!(body["data"]["fileReference"], "nalai1");
    assert_eq!(body["data"]["invoiceCount"], 1);
    assert_eq!(body["data"]["invoiceValue"], 1500);

    let req = test::TestRequest::get()
        .uri(&format!("/v1/wrls/bill-runs/{}/status", id))
        .insert_header(ctx.auth())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["status"], "sending");

    let req = test::TestRequest::get()
        .uri(&format!("/v1/wrls/bill-runs/{}", id))
        .insert_header(ctx.auth())
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let invoices = body["data"]["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0]["transactionReference"], "AAI1000001");
    assert_eq!(invoices[0]["customerReference"], "CUST1");
}

#[actix_web::test]
async fn test_transaction_on_generated_bill_run_conflicts() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "region": "A" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let add = |customer: &str| {
        test::TestRequest::post()
            .uri(&format!("/v1/wrls/bill-runs/{}/transactions", id))
            .insert_header(ctx.auth())
            .set_json(transaction(customer, "LIC/1", 900))
            .to_request()
    };

    assert_eq!(test::call_service(&app, add("CUST1")).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::patch()
        .uri(&format!("/v1/wrls/bill-runs/{}/generate", id))
        .insert_header(ctx.auth())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let resp = test::call_service(&app, add("CUST2")).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_delete_invoice_runs_in_background() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "region": "A" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/v1/wrls/bill-runs/{}/transactions", id))
        .insert_header(ctx.auth())
        .set_json(transaction("CUST1", "LIC/1", 900))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let invoice_id = body["data"]["invoiceId"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!("/v1/wrls/bill-runs/{}/invoices/{}", id, invoice_id))
        .insert_header(ctx.auth())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let mut remaining = usize::MAX;
    for _ in 0..50 {
        let req = test::TestRequest::get()
            .uri(&format!("/v1/wrls/bill-runs/{}", id))
            .insert_header(ctx.auth())
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        remaining = body["data"]["invoices"].as_array().map_or(usize::MAX, Vec::len);
        if remaining == 0 {
            assert_eq!(body["data"]["debitLineCount"], 0);
            assert_eq!(body["data"]["status"], "initialised");
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(remaining, 0);
}

#[actix_web::test]
async fn test_rebill_returns_both_invoices() {
    let ctx = context().await;
    let app = init_app!(ctx);
    let regime = ctx.services.regimes.find_by_slug("wrls").await.unwrap();

    let mut bill_run_ids = Vec::new();
    for _ in 0..2 {
        let req = test::TestRequest::post()
            .uri("/v1/wrls/bill-runs")
            .insert_header(ctx.auth())
            .set_json(json!({ "region": "A" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        bill_run_ids.push(body["data"]["id"].as_str().unwrap().to_string());
    }
    let (source, target) = (&bill_run_ids[0], &bill_run_ids[1]);

    let req = test::TestRequest::post()
        .uri(&format!("/v1/wrls/bill-runs/{}/transactions", source))
        .insert_header(ctx.auth())
        .set_json(transaction("CUST1", "LIC/1", 2500))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let invoice_id = body["data"]["invoiceId"].as_str().unwrap().to_string();

    for step in ["generate", "approve", "send"] {
        let req = test::TestRequest::patch()
            .uri(&format!("/v1/wrls/bill-runs/{}/{}", source, step))
            .insert_header(ctx.auth())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    }
    ctx.services
        .bill_runs
        .mark_billed(&regime, source.parse().unwrap())
        .await
        .unwrap();

    let req = test::TestRequest::patch()
        .uri(&format!("/v1/wrls/bill-runs/{}/invoices/{}/rebill", target, invoice_id))
        .insert_header(ctx.auth())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Value = test::read_body_json(resp).await;
    let invoices = body["data"]["invoices"].as_array().unwrap();
    assert_eq!(invoices.len(), 2);
    assert_eq!(invoices[0]["rebilledType"], "C");
    assert_eq!(invoices[1]["rebilledType"], "R");

    let req = test::TestRequest::patch()
        .uri(&format!("/v1/wrls/bill-runs/{}/invoices/{}/rebill", target, invoice_id))
        .insert_header(ctx.auth())
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn test_delete_unknown_licence_is_not_found() {
    let ctx = context().await;
    let app = init_app!(ctx);

    let req = test::TestRequest::post()
        .uri("/v1/wrls/bill-runs")
        .insert_header(ctx.auth())
        .set_json(json!({ "region": "A" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::delete()
        .uri(&format!(
            "/v1/wrls/bill-runs/{}/licences/{}",
            id,
            uuid::Uuid::now_v7()
        ))
        .insert_header(ctx.auth())
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
