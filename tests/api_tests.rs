use std::collections::BTreeMap;

use actix_web::{App, http::StatusCode, test, web};
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
use serde_json::{Value as Json, json};

use simplrh::api::{self, context::ORGANIZATION_HEADER, middleware::RequestId};
use simplrh::app_state::AppState;
use simplrh::config::Config;
use simplrh::database::models::{
    absences, customers, employees, invoice_items, invoices, leave_requests, organizations,
};
use simplrh::services::payment_webhook::{self, SIGNATURE_HEADER};

const WEBHOOK_SECRET: &str = "whsec_test";

fn organization() -> organizations::Model {
    organizations::Model {
        id: 1,
        name: "Atelier Dupont SARL".to_string(),
        legal_form: Some("SARL".to_string()),
        siret: Some("73282932000074".to_string()),
        vat_number: Some("FR44732829320".to_string()),
        address: Some("12 rue de la République".to_string()),
        postal_code: Some("69002".to_string()),
        city: Some("Lyon".to_string()),
        email: "contact@atelier-dupont.fr".to_string(),
        phone: None,
        iban: Some("FR7630006000011234567890189".to_string()),
        invoice_prefix: "FAC".to_string(),
        payment_terms_days: 30,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        updated_at: None,
    }
}

fn customer() -> customers::Model {
    customers::Model {
        id: 7,
        organization_id: 1,
        name: "Boulangerie Martin".to_string(),
        email: "compta@boulangerie-martin.fr".to_string(),
        address: Some("3 place Bellecour".to_string()),
        postal_code: Some("69002".to_string()),
        city: Some("Lyon".to_string()),
        siret: None,
        vat_number: None,
        created_at: Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap(),
    }
}

fn invoice(status: &str) -> invoices::Model {
    invoices::Model {
        id: 11,
        organization_id: 1,
        customer_id: 7,
        number: "FAC-0011".to_string(),
        status: status.to_string(),
        issue_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
        due_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
        total_ht: dec!(100.00),
        total_vat: dec!(20.00),
        total_ttc: dec!(120.00),
        notes: None,
        sent_at: None,
        paid_at: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        updated_at: None,
    }
}

fn item() -> invoice_items::Model {
    invoice_items::Model {
        id: 1,
        invoice_id: 11,
        position: 1,
        label: "Site vitrine".to_string(),
        quantity: dec!(1),
        unit_price: dec!(100.00),
        vat_rate: dec!(20),
    }
}

fn employee() -> employees::Model {
    employees::Model {
        id: 2,
        organization_id: 1,
        registration_number: "M-002".to_string(),
        first_name: "Claire".to_string(),
        last_name: "Moreau".to_string(),
        email: "claire.moreau@atelier-dupont.fr".to_string(),
        job_title: Some("Comptable".to_string()),
        hire_date: NaiveDate::from_ymd_opt(2024, 9, 1).unwrap(),
        manager_email: Some("direction@atelier-dupont.fr".to_string()),
        created_at: Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap(),
    }
}

fn leave_request(status: &str) -> leave_requests::Model {
    leave_requests::Model {
        id: 4,
        organization_id: 1,
        employee_id: 2,
        kind: "paid_leave".to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 4, 13).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 4, 17).unwrap(),
        reason: None,
        status: status.to_string(),
        decided_at: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 20, 8, 0, 0).unwrap(),
    }
}

fn count_row(n: i64) -> BTreeMap<String, Value> {
    BTreeMap::from([("num_items".to_string(), Value::BigInt(Some(n)))])
}

fn state(db: DatabaseConnection) -> web::Data<AppState> {
    let config = Config {
        payment_webhook_secret: Some(WEBHOOK_SECRET.to_string()),
        ..Config::default()
    };
    web::Data::new(AppState::new(db, config).unwrap())
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

macro_rules! app {
    ($db:expr) => {
        test::init_service(
            App::new()
                .wrap(RequestId)
                .app_data(state($db))
                .service(web::scope("/api").configure(api::configure)),
        )
        .await
    };
}

#[actix_web::test]
async fn sent_invoice_cannot_be_edited() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![invoice("sent")]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::put()
        .uri("/api/invoices/11")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .set_json(json!({
            "customer_id": 7,
            "items": [{ "label": "Site vitrine", "quantity": "2", "unit_price": "100.00", "vat_rate": "20" }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body: Json = test::read_body_json(resp).await;
    assert_eq!(body["code"], "CONFLICT");
}

#[actix_web::test]
async fn missing_tenant_header_is_unauthorized() {
    let app = app!(empty_db());

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/customers").to_request()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[actix_web::test]
async fn unknown_organization_is_unauthorized() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<organizations::Model>::new()])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::get()
        .uri("/api/employees")
        .insert_header((ORGANIZATION_HEADER, "99"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn invoice_pdf_is_served_as_attachment() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![invoice("sent")]])
        .append_query_results([vec![customer()]])
        .append_query_results([vec![item()]])
        .append_query_results([Vec::<BTreeMap<String, Value>>::new()])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::get()
        .uri("/api/invoices/11/pdf")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers().get("content-type").unwrap(), "application/pdf");
    let disposition = resp.headers().get("content-disposition").unwrap().to_str().unwrap().to_string();
    assert!(disposition.contains("FAC-0011.pdf"));

    let body = test::read_body(resp).await;
    assert!(body.starts_with(b"%PDF"));
}

#[actix_web::test]
async fn payroll_export_rejects_unknown_dialect() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::get()
        .uri("/api/payroll/export?dialect=sage&month=2026-03")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn webhook_without_signature_is_rejected() {
    let app = app!(empty_db());

    let req = test::TestRequest::post()
        .uri("/api/webhooks/payments")
        .set_payload(r#"{"id":"evt_1","type":"payment_intent.succeeded"}"#)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn signed_unrelated_event_is_ignored() {
    let app = app!(empty_db());

    let body = r#"{"id":"evt_2","type":"customer.created","data":{"object":{"id":"cus_1"}}}"#;
    let ts = Utc::now().timestamp();
    let signature = payment_webhook::sign(WEBHOOK_SECRET, ts, body.as_bytes()).unwrap();

    let req = test::TestRequest::post()
        .uri("/api/webhooks/payments")
        .insert_header((SIGNATURE_HEADER, format!("t={},v1={}", ts, signature)))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json: Json = test::read_body_json(resp).await;
    assert_eq!(json["outcome"], "ignored");
}

#[actix_web::test]
async fn health_pings_database() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();
    let app = app!(db);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/api/health").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json: Json = test::read_body_json(resp).await;
    assert_eq!(json["database"], true);
}

#[actix_web::test]
async fn created_invoice_is_numbered_draft() {
    let mut created = invoice("draft");
    created.number = "FAC-0003".to_string();
    let taken: Vec<BTreeMap<String, Value>> = ["FAC-0001", "FAC-0002"]
        .iter()
        .map(|n| BTreeMap::from([("number".to_string(), Value::String(Some(Box::new(n.to_string()))))]))
        .collect();
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![customer()]])
        .append_query_results([taken])
        .append_query_results([vec![created]])
        .append_query_results([vec![BTreeMap::from([("id".to_string(), Value::BigInt(Some(1)))])]])
        .append_query_results([vec![customer()]])
        .append_query_results([vec![item()]])
        .append_query_results([Vec::<BTreeMap<String, Value>>::new()])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::post()
        .uri("/api/invoices")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .set_json(json!({
            "customer_id": 7,
            "items": [{ "label": "Site vitrine", "quantity": "1", "unit_price": "100.00", "vat_rate": "20" }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let body: Json = test::read_body_json(resp).await;
    assert_eq!(body["invoice"]["number"], "FAC-0003");
    assert_eq!(body["invoice"]["status"], "draft");
    assert_eq!(body["customer"]["id"], 7);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
}

#[actix_web::test]
async fn customer_with_invoices_cannot_be_deleted() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![customer()]])
        .append_query_results([vec![count_row(2)]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::delete()
        .uri("/api/customers/7")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn decided_leave_request_cannot_be_decided_again() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![leave_request("approved")]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::patch()
        .uri("/api/leave-requests/4/decision")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .set_json(json!({ "decision": "rejected" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[actix_web::test]
async fn pending_is_not_a_decision() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::patch()
        .uri("/api/leave-requests/4/decision")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .set_json(json!({ "decision": "pending" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn approved_leave_returns_created_absence() {
    let absence = absences::Model {
        id: 30,
        organization_id: 1,
        employee_id: 2,
        kind: "paid_leave".to_string(),
        start_date: NaiveDate::from_ymd_opt(2026, 4, 13).unwrap(),
        end_date: NaiveDate::from_ymd_opt(2026, 4, 17).unwrap(),
        status: "approved".to_string(),
        comment: None,
        created_at: Utc.with_ymd_and_hms(2026, 3, 21, 9, 0, 0).unwrap(),
    };
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![organization()]])
        .append_query_results([vec![leave_request("pending")]])
        .append_query_results([vec![employee()]])
        .append_query_results([vec![leave_request("approved")]])
        .append_query_results([vec![absence]])
        .into_connection();
    let app = app!(db);

    let req = test::TestRequest::patch()
        .uri("/api/leave-requests/4/decision")
        .insert_header((ORGANIZATION_HEADER, "1"))
        .set_json(json!({ "decision": "approved" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Json = test::read_body_json(resp).await;
    assert_eq!(body["leave_request"]["status"], "approved");
    assert_eq!(body["absence"]["start_date"], "2026-04-13");
    assert_eq!(body["absence"]["end_date"], "2026-04-17");
}
