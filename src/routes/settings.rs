use actix_web::{web, HttpResponse, Result};
use serde_json::{json, Value};

use crate::{db::now, state::AppState};

const SETTINGS_KEY: &str = "default";

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/settings")
            .route(web::get().to(get_settings))
            .route(web::post().to(save_settings)),
    );
}

pub async fn load_settings(pool: &sqlx::SqlitePool) -> Value {
    let stored = sqlx::query_scalar::<_, String>("SELECT value FROM app_settings WHERE key = ?")
        .bind(SETTINGS_KEY)
        .fetch_optional(pool)
        .await
        .unwrap_or(None);
    stored
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_else(|| json!({}))
}

async fn get_settings(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(load_settings(&state.db).await))
}

async fn save_settings(
    state: web::Data<AppState>,
    payload: web::Json<Value>,
) -> Result<HttpResponse> {
    let value = payload.into_inner();
    if !value.is_object() {
        return Ok(HttpResponse::BadRequest()
            .json(json!({ "errors": ["Settings must be an object."] })));
    }

    let raw = value.to_string();
    let ts = now();
    sqlx::query(
        r#"INSERT INTO app_settings (key, value, created_at, updated_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
    )
    .bind(SETTINGS_KEY)
    .bind(&raw)
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    Ok(HttpResponse::Ok().json(value))
}
