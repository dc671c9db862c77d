use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::{
    auth::new_id,
    db::{fetch_client, now},
    models::{ClientRow, LANGUAGES, POOL_TYPES, SERVICE_DAYS},
    state::AppState,
};

#[derive(Debug, Deserialize)]
pub struct ClientInput {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub city: String,
    pub gate_code: Option<String>,
    pub service_day: String,
    pub monthly_rate: f64,
    #[serde(default = "default_pool_type")]
    pub pool_type: String,
    #[serde(default = "default_language")]
    pub language: String,
    pub is_active: Option<bool>,
    pub notes: Option<String>,
}

fn default_pool_type() -> String {
    "chlorine".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

#[derive(Deserialize)]
struct ClientFilter {
    active: Option<String>,
    q: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/clients")
            .route(web::get().to(list_clients))
            .route(web::post().to(create_client)),
    )
    .service(
        web::resource("/clients/{id}")
            .route(web::get().to(get_client))
            .route(web::put().to(update_client)),
    );
}

fn validate_input(input: &ClientInput) -> Vec<String> {
    let mut errors = Vec::new();
    if input.name.trim().len() < 2 {
        errors.push("Name must be at least 2 characters.".to_string());
    }
    if input.phone.trim().len() < 10 {
        errors.push("Phone number must be at least 10 digits.".to_string());
    }
    if input.address.trim().len() < 5 {
        errors.push("Address must be at least 5 characters.".to_string());
    }
    if input.city.trim().len() < 2 {
        errors.push("City must be at least 2 characters.".to_string());
    }
    if !SERVICE_DAYS.contains(&input.service_day.as_str()) {
        errors.push(format!("Service day must be one of: {}.", SERVICE_DAYS.join(", ")));
    }
    if input.monthly_rate < 0.0 {
        errors.push("Monthly rate must be positive.".to_string());
    }
    if !POOL_TYPES.contains(&input.pool_type.as_str()) {
        errors.push(format!("Pool type must be one of: {}.", POOL_TYPES.join(", ")));
    }
    if !LANGUAGES.contains(&input.language.as_str()) {
        errors.push(format!("Language must be one of: {}.", LANGUAGES.join(", ")));
    }
    errors
}

async fn list_clients(
    state: web::Data<AppState>,
    query: web::Query<ClientFilter>,
) -> Result<HttpResponse> {
    let mut where_clause = String::from(" FROM clients WHERE 1 = 1");
    let name_pattern = query
        .q
        .as_deref()
        .filter(|q| !q.trim().is_empty())
        .map(|q| format!("%{}%", q.trim()));

    if query.active.as_deref() == Some("true") {
        where_clause.push_str(" AND is_active = 1");
    }
    if name_pattern.is_some() {
        where_clause.push_str(" AND name LIKE ?");
    }

    let count_sql = format!("SELECT COUNT(*){where_clause}");
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(pattern) = &name_pattern {
        count_query = count_query.bind(pattern.clone());
    }
    let total = count_query
        .fetch_one(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let mut sql = format!("SELECT *{where_clause} ORDER BY name COLLATE NOCASE");
    let limit = query.limit.unwrap_or(0) as u64;
    if limit > 0 {
        let page = u64::from(query.page.unwrap_or(1).max(1));
        // clamped so the literal stays a valid SQLite integer
        let offset = (page - 1).saturating_mul(limit).min(i64::MAX as u64);
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
    }

    let mut rows_query = sqlx::query_as::<_, ClientRow>(&sql);
    if let Some(pattern) = &name_pattern {
        rows_query = rows_query.bind(pattern.clone());
    }
    let rows = rows_query
        .fetch_all(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok()
        .insert_header(("X-Total-Count", total.to_string()))
        .json(rows))
}

async fn get_client(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    match fetch_client(&state.db, &path.into_inner()).await {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Client not found" }))),
    }
}

async fn create_client(
    state: web::Data<AppState>,
    payload: web::Json<ClientInput>,
) -> Result<HttpResponse> {
    let input = payload.into_inner();
    let errors = validate_input(&input);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let id = new_id();
    let ts = now();
    sqlx::query(
        r#"INSERT INTO clients
           (id, name, phone, address, city, gate_code, service_day, monthly_rate,
            pool_type, is_active, language, notes, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(input.name.trim())
    .bind(input.phone.trim())
    .bind(input.address.trim())
    .bind(input.city.trim())
    .bind(&input.gate_code)
    .bind(&input.service_day)
    .bind(input.monthly_rate)
    .bind(&input.pool_type)
    .bind(input.is_active.unwrap_or(true))
    .bind(&input.language)
    .bind(&input.notes)
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    match fetch_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Created().json(row)),
        None => Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "Client not found after insert" }))),
    }
}

async fn update_client(
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<ClientInput>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let input = payload.into_inner();
    let errors = validate_input(&input);
    if !errors.is_empty() {
        return Ok(HttpResponse::BadRequest().json(json!({ "errors": errors })));
    }

    let result = sqlx::query(
        r#"UPDATE clients
           SET name = ?, phone = ?, address = ?, city = ?, gate_code = ?, service_day = ?,
               monthly_rate = ?, pool_type = ?, is_active = ?, language = ?, notes = ?,
               updated_at = ?
           WHERE id = ?"#,
    )
    .bind(input.name.trim())
    .bind(input.phone.trim())
    .bind(input.address.trim())
    .bind(input.city.trim())
    .bind(&input.gate_code)
    .bind(&input.service_day)
    .bind(input.monthly_rate)
    .bind(&input.pool_type)
    .bind(input.is_active.unwrap_or(true))
    .bind(&input.language)
    .bind(&input.notes)
    .bind(now())
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Client not found" })));
    }

    match fetch_client(&state.db, &id).await {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Client not found" }))),
    }
}
