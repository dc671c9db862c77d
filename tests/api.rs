use actix_web::{http::StatusCode, middleware, test, web, App};
use actix_web_httpauth::middleware::HttpAuthentication;
use serde_json::{json, Value};
use sqlx::sqlite::SqlitePoolOptions;

use pooltrack::{
    auth,
    backup::BackupManager,
    db, routes,
    state::{AppState, MailConfig, SmsConfig},
};

const AUTH: (&str, &str) = ("Authorization", "Basic YWRtaW46YWRtaW4=");

fn lock_admin_credentials() {
    static ONCE: std::sync::Once = std::sync::Once::new();
    ONCE.call_once(|| {
        std::env::set_var("ADMIN_USER", "admin");
        std::env::set_var("ADMIN_PASSWORD", "admin");
    });
}

async fn test_state(backup_dir: &std::path::Path) -> AppState {
    lock_admin_credentials();
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::run_migrations(&pool).await.unwrap();
    db::seed_defaults(&pool).await.unwrap();
    AppState {
        db: pool,
        sms: SmsConfig::default(),
        mail: MailConfig::default(),
        backup: BackupManager::new(backup_dir),
        cron_secret: "test-secret".to_string(),
    }
}

macro_rules! test_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .wrap(middleware::Logger::default())
                .route("/health", web::get().to(routes::health))
                .configure(routes::cron::configure)
                .service(
                    web::scope("/api")
                        .wrap(HttpAuthentication::basic(auth::owner_validator))
                        .configure(routes::configure_api),
                ),
        )
        .await
    };
}

fn client_payload(name: &str) -> Value {
    json!({
        "name": name,
        "phone": "3055551234",
        "address": "123 Palm Ave",
        "city": "Miami",
        "service_day": "tuesday",
        "monthly_rate": 150.5
    })
}

macro_rules! create_client {
    ($app:expr, $name:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/clients")
            .insert_header(AUTH)
            .set_json(client_payload($name))
            .to_request();
        let resp = test::call_service($app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = test::read_body_json(resp).await;
        body
    }};
}

#[actix_web::test]
async fn health_is_public() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn api_requires_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/clients").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/clients")
        .insert_header(("Authorization", "Basic YWRtaW46d3Jvbmc="))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn client_create_applies_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let body = create_client!(&app, "Maria Gonzalez");
    assert_eq!(body["name"], "Maria Gonzalez");
    assert_eq!(body["monthly_rate"], 150.5);
    assert_eq!(body["service_day"], "tuesday");
    assert_eq!(body["is_active"], true);
    assert_eq!(body["pool_type"], "chlorine");
    assert_eq!(body["language"], "en");
}

#[actix_web::test]
async fn client_validation_collects_all_errors() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/clients")
        .insert_header(AUTH)
        .set_json(json!({
            "name": "X",
            "phone": "123",
            "address": "a",
            "city": "b",
            "service_day": "someday",
            "monthly_rate": -5.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.len() >= 5);
}

#[actix_web::test]
async fn client_list_filters_and_counts() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    create_client!(&app, "Alice Rivera");
    create_client!(&app, "Bob Stone");
    let carol = create_client!(&app, "Carol Rivera");

    // deactivate Carol
    let mut update = client_payload("Carol Rivera");
    update["is_active"] = json!(false);
    let req = test::TestRequest::put()
        .uri(&format!("/api/clients/{}", carol["id"].as_str().unwrap()))
        .insert_header(AUTH)
        .set_json(update)
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/clients?q=Rivera")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let total = resp
        .headers()
        .get("X-Total-Count")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(total, "2");

    let req = test::TestRequest::get()
        .uri("/api/clients?q=Rivera&active=true")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["name"], "Alice Rivera");

    let req = test::TestRequest::get()
        .uri("/api/clients?page=2&limit=2")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(
        resp.headers().get("X-Total-Count").unwrap().to_str().unwrap(),
        "3"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn extreme_pagination_values_return_empty_page() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    create_client!(&app, "Lena Marsh");

    let req = test::TestRequest::get()
        .uri("/api/clients?page=4294967295&limit=4294967295")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("X-Total-Count").unwrap().to_str().unwrap(),
        "1"
    );
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn missing_client_returns_404() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/clients/nope")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn payment_defaults_due_date_and_derives_status() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let client = create_client!(&app, "Dana Brooks");
    let client_id = client["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "invoice_date": "2024-01-01",
            "amount_due": 150.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["due_date"], "2024-01-31");
    assert_eq!(body["status"], "overdue");
    assert!(body["days_overdue"].as_i64().unwrap() > 0);
    assert_eq!(body["balance"], 150.0);
    assert_eq!(body["client"]["name"], "Dana Brooks");

    // settle it
    let req = test::TestRequest::put()
        .uri(&format!("/api/payments/{}", body["id"].as_str().unwrap()))
        .insert_header(AUTH)
        .set_json(json!({
            "amount_paid": 150.0,
            "payment_date": "2024-02-05",
            "payment_method": "zelle"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "paid");
    assert_eq!(body["days_overdue"], 0);
    assert_eq!(body["balance"], 0.0);
}

#[actix_web::test]
async fn payment_rejects_unknown_client() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": "ghost",
            "invoice_date": "2024-01-01",
            "amount_due": 100.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().unwrap().contains("Unknown client")));
}

#[actix_web::test]
async fn work_order_totals_and_status_filter() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let client = create_client!(&app, "Evan Ford");
    let client_id = client["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri("/api/work")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "work_date": "2024-03-10",
            "work_type": "filter_replacement",
            "parts_cost": 120.0,
            "labor_hours": 2.0
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    // 120 + 2h at the 75/h default
    assert_eq!(body["total_charge"], 270.0);
    assert_eq!(body["status"], "overdue");
    assert_eq!(body["balance"], 270.0);

    let req = test::TestRequest::get()
        .uri("/api/work?status=paid")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 0);

    let req = test::TestRequest::get()
        .uri(&format!("/api/work?client_id={client_id}&status=overdue"))
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn overdue_merges_payments_and_work() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let client = create_client!(&app, "Fay Gomez");
    let client_id = client["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "invoice_date": "2024-01-01",
            "due_date": "2024-01-15",
            "amount_due": 150.0
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::post()
        .uri("/api/work")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "work_date": "2024-06-01",
            "work_type": "pump_repair",
            "parts_cost": 80.0,
            "labor_hours": 1.0,
            "amount_paid": 55.0
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CREATED);

    let req = test::TestRequest::get()
        .uri("/api/overdue")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let items: Value = test::read_body_json(resp).await;
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    // oldest debt first
    assert_eq!(items[0]["type"], "payment");
    assert_eq!(items[0]["amount"], 150.0);
    assert_eq!(items[1]["type"], "work");
    assert_eq!(items[1]["amount"], 100.0);
    assert!(items[0]["days_overdue"].as_i64().unwrap() > items[1]["days_overdue"].as_i64().unwrap());
}

#[actix_web::test]
async fn schedule_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let client = create_client!(&app, "Gina Hart");
    let client_id = client["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/schedule")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "scheduled_date": "2024-07-04",
            "scheduled_time": "09:30",
            "service_type": "regular"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "scheduled");
    assert_eq!(body["client"]["name"], "Gina Hart");
    assert_eq!(body["client"]["address"], "123 Palm Ave");
    let entry_id = body["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::get()
        .uri("/api/schedule?date=2024-07-04")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);

    let req = test::TestRequest::put()
        .uri(&format!("/api/schedule/{entry_id}"))
        .insert_header(AUTH)
        .set_json(json!({ "status": "completed", "notes": "skimmer cleaned" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["notes"], "skimmer cleaned");

    let req = test::TestRequest::put()
        .uri(&format!("/api/schedule/{entry_id}"))
        .insert_header(AUTH)
        .set_json(json!({ "status": "teleported" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn settings_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/settings")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({}));

    let req = test::TestRequest::post()
        .uri("/api/settings")
        .insert_header(AUTH)
        .set_json(json!({ "zelle": "pay@pooltrack.example", "business_phone": "3055550000" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get()
        .uri("/api/settings")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["zelle"], "pay@pooltrack.example");
}

#[actix_web::test]
async fn import_is_all_or_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/import")
        .insert_header(AUTH)
        .set_json(json!({
            "clients": [
                {
                    "name": "Good Client",
                    "phone": "3055551111",
                    "address": "10 Ocean Dr",
                    "city": "Miami",
                    "service_day": "monday",
                    "monthly_rate": 140.0
                },
                { "name": "Bad Client" }
            ]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().unwrap().starts_with("clients.1.")));

    // nothing was written
    let req = test::TestRequest::get()
        .uri("/api/clients")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[actix_web::test]
async fn import_commits_valid_payload_with_warnings() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/import")
        .insert_header(AUTH)
        .set_json(json!({
            "clients": [{
                "id": "c-1",
                "name": "Imported Client",
                "phone": "3055552222",
                "address": "20 Bay Rd",
                "city": "Miami",
                "service_day": "friday",
                "monthly_rate": 160.0
            }],
            "payments": [{
                "client_id": "c-1",
                "invoice_date": "2024-05-01",
                "amount_due": 160.0
            }],
            "additionalWork": [{
                "client_id": "orphan",
                "work_date": "2024-05-02",
                "work_type": "leak_repair",
                "parts_cost": 30.0,
                "labor_hours": 3.0
            }]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["imported"]["clients"], 1);
    assert_eq!(body["imported"]["payments"], 1);
    assert_eq!(body["imported"]["additionalWork"], 1);
    assert!(body["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w.as_str().unwrap().contains("orphan")));

    let req = test::TestRequest::get()
        .uri("/api/payments?client_id=c-1")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let list: Value = test::read_body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    // net-30 default applied during import too
    assert_eq!(list[0]["due_date"], "2024-05-31");
}

#[actix_web::test]
async fn import_preview_parses_text_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/api/import/preview")
        .insert_header(AUTH)
        .set_json(json!({
            "text": "Maria Gonzalez\n841 Collins Ave\n(305) 555-1234\n\nJohn Smith\n12 Pine St\n305-555-9876"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let drafts = body["clients"].as_array().unwrap();
    assert_eq!(drafts.len(), 2);
    assert_eq!(drafts[0]["name"], "Maria Gonzalez");
    assert_eq!(drafts[0]["city"], "Miami");
    assert_eq!(drafts[1]["name"], "John Smith");

    let req = test::TestRequest::post()
        .uri("/api/import/preview")
        .insert_header(AUTH)
        .set_json(json!({
            "csv": "nombre,telefono,direccion\nAna Ruiz,305-555-0001,7 Coral Way\n"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    let drafts = body["clients"].as_array().unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0]["name"], "Ana Ruiz");

    let req = test::TestRequest::post()
        .uri("/api/import/preview")
        .insert_header(AUTH)
        .set_json(json!({}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn export_and_backup_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    create_client!(&app, "Hank Iris");

    let req = test::TestRequest::get()
        .uri("/api/export")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp
        .headers()
        .get("Content-Disposition")
        .unwrap()
        .to_str()
        .unwrap()
        .contains("attachment"));
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stats"]["clients"], 1);
    assert_eq!(body["data"]["clients"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/export/clients.csv")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let csv_body = test::read_body(resp).await;
    let csv_text = String::from_utf8(csv_body.to_vec()).unwrap();
    assert!(csv_text.starts_with("name,phone,address"));
    assert!(csv_text.contains("Hank Iris"));

    // no backup yet
    let req = test::TestRequest::get()
        .uri("/api/backup/recover")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = test::TestRequest::post()
        .uri("/api/backup")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["saved"]["primary"], true);
    assert_eq!(body["saved"]["versioned"], true);

    let req = test::TestRequest::get()
        .uri("/api/backup/recover")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["source"], "versions");
    assert_eq!(body["data"]["clients"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::get()
        .uri("/api/backup/versions")
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let versions: Value = test::read_body_json(resp).await;
    assert_eq!(versions.as_array().unwrap().len(), 1);
    let first_id = versions[0]["id"].as_i64().unwrap();

    let req = test::TestRequest::get()
        .uri(&format!("/api/backup/versions/{first_id}"))
        .insert_header(AUTH)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[actix_web::test]
async fn sms_send_reports_disabled_gateway() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let client = create_client!(&app, "Ivy Jones");
    let client_id = client["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/payments")
        .insert_header(AUTH)
        .set_json(json!({
            "client_id": client_id,
            "invoice_date": "2024-01-01",
            "amount_due": 150.0
        }))
        .to_request();
    let payment: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let payment_id = payment["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/sms/send")
        .insert_header(AUTH)
        .set_json(json!({ "type": "payment", "id": payment_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["sent"], false);
    assert!(body["message"].as_str().unwrap().contains("150.00"));

    // flag untouched when nothing was actually sent
    let req = test::TestRequest::get()
        .uri(&format!("/api/payments?client_id={client_id}"))
        .insert_header(AUTH)
        .to_request();
    let list: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(list[0]["reminder_sent"], false);
}

#[actix_web::test]
async fn cron_requires_bearer_secret() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    let req = test::TestRequest::get()
        .uri("/api/cron/payment-reminders")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/cron/payment-reminders")
        .insert_header(("Authorization", "Bearer nope"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = test::TestRequest::get()
        .uri("/api/cron/payment-reminders")
        .insert_header(("Authorization", "Bearer test-secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["gateway"], "disabled");
    assert_eq!(body["sent"], 0);
}

#[actix_web::test]
async fn cron_auto_backup_stores_daily_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(dir.path()).await;
    let app = test_app!(state);

    create_client!(&app, "Kim Lopez");

    let req = test::TestRequest::get()
        .uri("/api/cron/auto-backup")
        .insert_header(("Authorization", "Bearer test-secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["stats"]["clients"], 1);
    assert_eq!(body["saved"]["primary"], true);
    assert_eq!(body["email_sent"], false);
    let key = body["key"].as_str().unwrap();
    assert!(key.starts_with("backup_"));

    let stored = sqlx::query_scalar::<_, String>("SELECT value FROM app_settings WHERE key = ?")
        .bind(key)
        .fetch_one(&state.db)
        .await
        .unwrap();
    let snapshot: Value = serde_json::from_str(&stored).unwrap();
    assert_eq!(snapshot["clients"].as_array().unwrap().len(), 1);

    // running twice on the same day overwrites, not duplicates
    let req = test::TestRequest::get()
        .uri("/api/cron/auto-backup")
        .insert_header(("Authorization", "Bearer test-secret"))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM app_settings WHERE key LIKE 'backup_%'",
    )
    .fetch_one(&state.db)
    .await
    .unwrap();
    assert_eq!(count, 1);
}
