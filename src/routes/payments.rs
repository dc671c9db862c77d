use actix_web::{web, HttpResponse, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::new_id,
    db::{fetch_client, fetch_payment_with_client, now},
    domain,
    models::{ClientRef, PaymentRow, PAYMENT_METHODS},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct PaymentInput {
    pub client_id: String,
    pub invoice_date: String,
    pub due_date: Option<String>,
    pub amount_due: f64,
    #[serde(default)]
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reminder_sent: bool,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentInput {
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
}

#[derive(Deserialize)]
struct PaymentFilter {
    status: Option<String>,
    client_id: Option<String>,
}

#[derive(Serialize)]
pub struct PaymentView {
    #[serde(flatten)]
    row: PaymentRow,
    status: String,
    days_overdue: i64,
    balance: f64,
    client: Option<ClientRef>,
}

pub fn to_view(row: PaymentRow, today: NaiveDate) -> PaymentView {
    let status = domain::payment_status(row.amount_due, row.amount_paid, &row.due_date, today);
    let days_overdue = domain::days_overdue(row.amount_due, row.amount_paid, &row.due_date, today);
    let balance = domain::balance(row.amount_due, row.amount_paid);
    let client = row.client_name.clone().map(|name| ClientRef {
        id: row.client_id.clone(),
        name,
    });
    PaymentView {
        status: status.to_string(),
        days_overdue,
        balance,
        client,
        row,
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/payments")
            .route(web::get().to(list_payments))
            .route(web::post().to(create_payment)),
    )
    .service(web::resource("/payments/{id}").route(web::put().to(record_payment)))
    .service(web::resource("/overdue").route(web::get().to(list_overdue)));
}

fn validate_method(method: &Option<String>, errors: &mut Vec<String>) {
    if let Some(method) = method {
        if !PAYMENT_METHODS.contains(&method.as_str()) {
            errors.push(format!(
                "Payment method must be one of: {}.",
                PAYMENT_METHODS.join(", ")
            ));
        }
    }
}

async fn list_payments(
    state: web::Data<AppState>,
    query: web::Query<PaymentFilter>,
) -> Result<HttpResponse> {
    let mut sql = String::from(
        r#"SELECT p.*, c.name AS client_name
           FROM payments p
           LEFT JOIN clients c ON p.client_id = c.id
           WHERE 1 = 1"#,
    );
    if query.client_id.is_some() {
        sql.push_str(" AND p.client_id = ?");
    }
    sql.push_str(" ORDER BY p.due_date DESC");

    let mut rows_query = sqlx::query_as::<_, PaymentRow>(&sql);
    if let Some(client_id) = &query.client_id {
        rows_query = rows_query.bind(client_id.clone());
    }
    let rows = rows_query
        .fetch_all(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let today = domain::today();
    let views: Vec<PaymentView> = rows
        .into_iter()
        .map(|row| to_view(row, today))
        .filter(|view| match &query.status {
            Some(status) => &view.status == status,
            None => true,
        })
        .collect();

    Ok(HttpResponse::Ok().json(views))
}

async fn create_payment(
    state: web::Data<AppState>,
    payload: web::Json<PaymentInput>,
) -> Result<HttpResponse> {
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.client_id.trim().is_empty() {
        errors.push("Client is required.".to_string());
    } else if fetch_client(&state.db, &input.client_id).await.is_none() {
        errors.push("Unknown client.".to_string());
    }
    if input.invoice_date.trim().is_empty() {
        errors.push("Invoice date is required.".to_string());
    }
    if input.amount_due < 0.0 {
        errors.push("Amount due must be positive.".to_string());
    }
    if input.amount_paid < 0.0 {
        errors.push("Amount paid must be positive.".to_string());
    }
    validate_method(&input.payment_method, &mut errors);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let id = new_id();
    let ts = now();
    let due_date = input
        .due_date
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| domain::default_due_date(&input.invoice_date));

    sqlx::query(
        r#"INSERT INTO payments
           (id, client_id, invoice_date, due_date, amount_due, amount_paid,
            payment_date, payment_method, reminder_sent, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.client_id)
    .bind(&input.invoice_date)
    .bind(&due_date)
    .bind(input.amount_due)
    .bind(input.amount_paid)
    .bind(&input.payment_date)
    .bind(&input.payment_method)
    .bind(input.reminder_sent)
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    match fetch_payment_with_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Created().json(to_view(row, domain::today()))),
        None => Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "Payment not found after insert" }))),
    }
}

async fn record_payment(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<RecordPaymentInput>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.amount_paid < 0.0 {
        errors.push("Amount paid must be positive.".to_string());
    }
    validate_method(&input.payment_method, &mut errors);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let result = sqlx::query(
        r#"UPDATE payments
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
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Payment not found" })));
    }

    match fetch_payment_with_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Ok().json(to_view(row, domain::today()))),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Payment not found" }))),
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OverduePaymentRow {
    id: String,
    client_id: String,
    due_date: String,
    amount_due: f64,
    amount_paid: f64,
    reminder_sent: bool,
    client_name: Option<String>,
    client_phone: Option<String>,
    client_language: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct OverdueWorkRow {
    id: String,
    client_id: String,
    work_date: String,
    parts_cost: f64,
    labor_hours: f64,
    labor_rate: f64,
    amount_paid: f64,
    reminder_sent: bool,
    client_name: Option<String>,
    client_phone: Option<String>,
    client_language: Option<String>,
}

#[derive(Serialize)]
struct OverdueItem {
    #[serde(rename = "type")]
    kind: String,
    id: String,
    client_id: String,
    client_name: String,
    phone: String,
    language: String,
    amount: f64,
    date: String,
    days_overdue: i64,
    reminder_sent: bool,
}

/// Merged view of every unpaid, past-due payment and work order, the way the
/// reminders job and the overdue report consume it.
async fn list_overdue(state: web::Data<AppState>) -> Result<HttpResponse> {
    let today = domain::today();

    let payments = sqlx::query_as::<_, OverduePaymentRow>(
        r#"SELECT p.id, p.client_id, p.due_date, p.amount_due, p.amount_paid, p.reminder_sent,
                  c.name AS client_name, c.phone AS client_phone, c.language AS client_language
           FROM payments p
           LEFT JOIN clients c ON p.client_id = c.id
           WHERE p.amount_paid < p.amount_due"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let work = sqlx::query_as::<_, OverdueWorkRow>(
        r#"SELECT w.id, w.client_id, w.work_date, w.parts_cost, w.labor_hours, w.labor_rate,
                  w.amount_paid, w.reminder_sent,
                  c.name AS client_name, c.phone AS client_phone, c.language AS client_language
           FROM additional_work w
           LEFT JOIN clients c ON w.client_id = c.id
           WHERE w.amount_paid < w.parts_cost + w.labor_hours * w.labor_rate"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let mut items: Vec<OverdueItem> = Vec::new();

    for row in payments {
        let days = domain::days_overdue(row.amount_due, row.amount_paid, &row.due_date, today);
        if days == 0 {
            continue;
        }
        items.push(OverdueItem {
            kind: "payment".to_string(),
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name.unwrap_or_default(),
            phone: row.client_phone.unwrap_or_default(),
            language: row.client_language.unwrap_or_else(|| "en".to_string()),
            amount: domain::balance(row.amount_due, row.amount_paid),
            date: row.due_date,
            days_overdue: days,
            reminder_sent: row.reminder_sent,
        });
    }

    for row in work {
        let total = domain::total_charge(row.parts_cost, row.labor_hours, row.labor_rate);
        let days = domain::days_overdue(total, row.amount_paid, &row.work_date, today);
        if days == 0 {
            continue;
        }
        items.push(OverdueItem {
            kind: "work".to_string(),
            id: row.id,
            client_id: row.client_id,
            client_name: row.client_name.unwrap_or_default(),
            phone: row.client_phone.unwrap_or_default(),
            language: row.client_language.unwrap_or_else(|| "en".to_string()),
            amount: domain::balance(total, row.amount_paid),
            date: row.work_date,
            days_overdue: days,
            reminder_sent: row.reminder_sent,
        });
    }

    items.sort_by(|a, b| b.days_overdue.cmp(&a.days_overdue));

    Ok(HttpResponse::Ok().json(items))
}
