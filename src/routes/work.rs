use actix_web::{web, HttpResponse, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::new_id,
    db::{fetch_client, fetch_work_with_client, now},
    domain,
    models::{ClientRef, WorkRow, DEFAULT_LABOR_RATE, PAYMENT_METHODS, WORK_TYPES},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct WorkInput {
    pub client_id: String,
    pub work_date: String,
    pub work_type: String,
    pub description: Option<String>,
    #[serde(default)]
    pub parts_cost: f64,
    #[serde(default)]
    pub labor_hours: f64,
    #[serde(default = "default_labor_rate")]
    pub labor_rate: f64,
    #[serde(default)]
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub invoice_sent: bool,
    #[serde(default)]
    pub reminder_sent: bool,
}

fn default_labor_rate() -> f64 {
    DEFAULT_LABOR_RATE
}

#[derive(Debug, Deserialize)]
pub struct RecordWorkPaymentInput {
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
struct WorkFilter {
    status: Option<String>,
    client_id: Option<String>,
}

#[derive(Serialize)]
pub struct WorkView {
    #[serde(flatten)]
    row: WorkRow,
    total_charge: f64,
    status: String,
    days_overdue: i64,
    balance: f64,
    client: Option<ClientRef>,
}

/// A work order becomes due the day the work is done; its charge is always
/// parts plus labor.
pub fn to_view(row: WorkRow, today: NaiveDate) -> WorkView {
    let total_charge = domain::total_charge(row.parts_cost, row.labor_hours, row.labor_rate);
    let status = domain::payment_status(total_charge, row.amount_paid, &row.work_date, today);
    let days_overdue = domain::days_overdue(total_charge, row.amount_paid, &row.work_date, today);
    let balance = domain::balance(total_charge, row.amount_paid);
    let client = row.client_name.clone().map(|name| ClientRef {
        id: row.client_id.clone(),
        name,
    });
    WorkView {
        total_charge,
        status: status.to_string(),
        days_overdue,
        balance,
        client,
        row,
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/work")
            .route(web::get().to(list_work))
            .route(web::post().to(create_work)),
    )
    .service(web::resource("/work/{id}").route(web::put().to(record_work_payment)));
}

async fn list_work(
    state: web::Data<AppState>,
    query: web::Query<WorkFilter>,
) -> Result<HttpResponse> {
    let mut sql = String::from(
        r#"SELECT w.*, c.name AS client_name
           FROM additional_work w
           LEFT JOIN clients c ON w.client_id = c.id
           WHERE 1 = 1"#,
    );
    if query.client_id.is_some() {
        sql.push_str(" AND w.client_id = ?");
    }
    sql.push_str(" ORDER BY w.work_date DESC");

    let mut rows_query = sqlx::query_as::<_, WorkRow>(&sql);
    if let Some(client_id) = &query.client_id {
        rows_query = rows_query.bind(client_id.clone());
    }
    let rows = rows_query
        .fetch_all(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let today = domain::today();
    let views: Vec<WorkView> = rows
        .into_iter()
        .map(|row| to_view(row, today))
        .filter(|view| match &query.status {
            Some(status) => &view.status == status,
            None => true,
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

async fn create_work(
    state: web::Data<AppState>,
    payload: web::Json<WorkInput>,
) -> Result<HttpResponse> {
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.client_id.trim().is_empty() {
        errors.push("Client is required.".to_string());
    } else if fetch_client(&state.db, &input.client_id).await.is_none() {
        errors.push("Unknown client.".to_string());
    }
    if input.work_date.trim().is_empty() {
        errors.push("Work date is required.".to_string());
    }
    if !WORK_TYPES.contains(&input.work_type.as_str()) {
        errors.push("Unknown work type.".to_string());
    }
    if input.parts_cost < 0.0 {
        errors.push("Parts cost must be positive.".to_string());
    }
    if input.labor_hours < 0.0 {
        errors.push("Labor hours must be positive.".to_string());
    }
    if input.labor_rate < 0.0 {
        errors.push("Labor rate must be positive.".to_string());
    }
    if input.amount_paid < 0.0 {
        errors.push("Amount paid must be positive.".to_string());
    }
    if let Some(method) = &input.payment_method {
        if !PAYMENT_METHODS.contains(&method.as_str()) {
            errors.push(format!(
                "Payment method must be one of: {}.",
                PAYMENT_METHODS.join(", ")
            ));
        }
    }
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let id = new_id();
    let ts = now();
    sqlx::query(
        r#"INSERT INTO additional_work
           (id, client_id, work_date, work_type, description, parts_cost, labor_hours,
            labor_rate, amount_paid, payment_date, payment_method, invoice_sent,
            reminder_sent, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.client_id)
    .bind(&input.work_date)
    .bind(&input.work_type)
    .bind(&input.description)
    .bind(input.parts_cost)
    .bind(input.labor_hours)
    .bind(input.labor_rate)
    .bind(input.amount_paid)
    .bind(&input.payment_date)
    .bind(&input.payment_method)
    .bind(input.invoice_sent)
    .bind(input.reminder_sent)
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    match fetch_work_with_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Created().json(to_view(row, domain::today()))),
        None => Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "Work order not found after insert" }))),
    }
}

async fn record_work_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<RecordWorkPaymentInput>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.amount_paid < 0.0 {
        errors.push("Amount paid must be positive.".to_string());
    }
    if let Some(method) = &input.payment_method {
        if !PAYMENT_METHODS.contains(&method.as_str()) {
            errors.push(format!(
                "Payment method must be one of: {}.",
                PAYMENT_METHODS.join(", ")
            ));
        }
    }
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let result = sqlx::query(
        r#"UPDATE additional_work
           SET amount_paid = ?, payment_date = ?, payment_method = ?, updated_at = ?
           WHERE id = ?"#,
    )
    .bind(input.amount_paid)
    .bind(&input.payment_date)
    .bind(&input.payment_method)
    .bind(now())
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Work order not found" })));
    }

    match fetch_work_with_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Ok().json(to_view(row, domain::today()))),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Work order not found" }))),
    }
}
