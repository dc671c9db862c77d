use actix_web::{web, HttpResponse, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    auth::new_id,
    db::{fetch_client, now},
    models::{ScheduleRow, SCHEDULE_STATUSES, SERVICE_TYPES},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ScheduleInput {
    pub client_id: String,
    pub scheduled_date: String,
    pub scheduled_time: Option<String>,
    #[serde(default = "default_service_type")]
    pub service_type: String,
    #[serde(default = "default_status")]
    pub status: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub confirmation_sent: bool,
}

fn default_service_type() -> String {
    "regular".to_string()
}

fn default_status() -> String {
    "scheduled".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ScheduleUpdateInput {
    pub status: String,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
struct ScheduleFilter {
    date: Option<String>,
    client_id: Option<String>,
}

/// Client contact details ride along so the crew has address, phone, and
/// gate code on the day sheet.
#[derive(Serialize)]
struct ScheduleClientRef {
    id: String,
    name: String,
    address: String,
    city: String,
    gate_code: Option<String>,
    phone: String,
}

#[derive(Serialize)]
struct ScheduleView {
    #[serde(flatten)]
    row: ScheduleRow,
    client: Option<ScheduleClientRef>,
}

fn to_view(row: ScheduleRow) -> ScheduleView {
    let client = row.client_name.clone().map(|name| ScheduleClientRef {
        id: row.client_id.clone(),
        name,
        address: row.client_address.clone().unwrap_or_default(),
        city: row.client_city.clone().unwrap_or_default(),
        gate_code: row.client_gate_code.clone(),
        phone: row.client_phone.clone().unwrap_or_default(),
    });
    ScheduleView { client, row }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/schedule")
            .route(web::get().to(list_schedule))
            .route(web::post().to(create_entry)),
    )
    .service(web::resource("/schedule/{id}").route(web::put().to(update_entry)));
}

async fn list_schedule(
    state: web::Data<AppState>,
    query: web::Query<ScheduleFilter>,
) -> Result<HttpResponse> {
    let mut sql = String::from(
        r#"SELECT s.*, c.name AS client_name, c.address AS client_address,
                  c.city AS client_city, c.gate_code AS client_gate_code,
                  c.phone AS client_phone
           FROM schedule s
           LEFT JOIN clients c ON s.client_id = c.id
           WHERE 1 = 1"#,
    );
    if query.date.is_some() {
        sql.push_str(" AND s.scheduled_date = ?");
    }
    if query.client_id.is_some() {
        sql.push_str(" AND s.client_id = ?");
    }
    sql.push_str(" ORDER BY s.scheduled_date, s.scheduled_time");

    let mut rows_query = sqlx::query_as::<_, ScheduleRow>(&sql);
    if let Some(date) = &query.date {
        rows_query = rows_query.bind(date.clone());
    }
    if let Some(client_id) = &query.client_id {
        rows_query = rows_query.bind(client_id.clone());
    }
    let rows = rows_query
        .fetch_all(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let views: Vec<ScheduleView> = rows.into_iter().map(to_view).collect();
    Ok(HttpResponse::Ok().json(views))
}

async fn create_entry(
    state: web::Data<AppState>,
    payload: web::Json<ScheduleInput>,
) -> Result<HttpResponse> {
    let input = payload.into_inner();
    let mut errors = Vec::new();
    if input.client_id.trim().is_empty() {
        errors.push("Client is required.".to_string());
    } else if fetch_client(&state.db, &input.client_id).await.is_none() {
        errors.push("Unknown client.".to_string());
    }
    if input.scheduled_date.trim().is_empty() {
        errors.push("Scheduled date is required.".to_string());
    }
    if !SERVICE_TYPES.contains(&input.service_type.as_str()) {
        errors.push(format!(
            "Service type must be one of: {}.",
            SERVICE_TYPES.join(", ")
        ));
    }
    if !SCHEDULE_STATUSES.contains(&input.status.as_str()) {
        errors.push(format!(
            "Status must be one of: {}.",
            SCHEDULE_STATUSES.join(", ")
        ));
    }
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let id = new_id();
    let ts = now();
    sqlx::query(
        r#"INSERT INTO schedule
           (id, client_id, scheduled_date, scheduled_time, service_type, status,
            notes, confirmation_sent, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(&input.client_id)
    .bind(&input.scheduled_date)
    .bind(&input.scheduled_time)
    .bind(&input.service_type)
    .bind(&input.status)
    .bind(&input.notes)
    .bind(input.confirmation_sent)
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let row = fetch_entry(&state, &id).await;
    match row {
        Some(row) => Ok(HttpResponse::Created().json(to_view(row))),
        None => Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "Schedule entry not found after insert" }))),
    }
}

async fn update_entry(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ScheduleUpdateInput>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let input = payload.into_inner();
    if !SCHEDULE_STATUSES.contains(&input.status.as_str()) {
        return Ok(HttpResponse::BadRequest().json(json!({
            "errors": [format!("Status must be one of: {}.", SCHEDULE_STATUSES.join(", "))]
        })));
    }

    let result = if let Some(notes) = &input.notes {
        sqlx::query("UPDATE schedule SET status = ?, notes = ?, updated_at = ? WHERE id = ?")
            .bind(&input.status)
            .bind(notes)
            .bind(now())
            .bind(&id)
            .execute(&state.db)
            .await
    } else {
        sqlx::query("UPDATE schedule SET status = ?, updated_at = ? WHERE id = ?")
            .bind(&input.status)
            .bind(now())
            .bind(&id)
            .execute(&state.db)
            .await
    }
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Schedule entry not found" })));
    }

    match fetch_entry(&state, &id).await {
        Some(row) => Ok(HttpResponse::Ok().json(to_view(row))),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Schedule entry not found" }))),
    }
}

async fn fetch_entry(state: &web::Data<AppState>, id: &str) -> Option<ScheduleRow> {
    sqlx::query_as::<_, ScheduleRow>(
        r#"SELECT s.*, c.name AS client_name, c.address AS client_address,
                  c.city AS client_city, c.gate_code AS client_gate_code,
                  c.phone AS client_phone
           FROM schedule s
           LEFT JOIN clients c ON s.client_id = c.id
           WHERE s.id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(&state.db)
    .await
    .unwrap_or(None)
}
