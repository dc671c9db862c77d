use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;

use crate::{
    db::snapshot,
    import::{commit_import, parse_client_text, parse_clients_csv, validate_import},
    models::ClientRow,
    state::AppState,
};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/export").route(web::get().to(export_json)))
        .service(web::resource("/export/clients.csv").route(web::get().to(export_clients_csv)))
        .service(web::resource("/import").route(web::post().to(import_data)))
        .service(web::resource("/import/preview").route(web::post().to(import_preview)))
        .service(
            web::resource("/backup")
                .route(web::get().to(backup_status))
                .route(web::post().to(run_backup)),
        )
        .service(web::resource("/backup/recover").route(web::get().to(recover_backup)))
        .service(web::resource("/backup/versions").route(web::get().to(list_versions)))
        .service(web::resource("/backup/versions/{id}").route(web::get().to(get_version)));
}

async fn export_json(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (data, stats) = snapshot(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let filename = format!("pooltrack-export-{}.json", crate::domain::today());
    Ok(HttpResponse::Ok()
        .insert_header((
            "Content-Disposition",
            format!("attachment; filename=\"{filename}\""),
        ))
        .json(json!({
            "version": env!("CARGO_PKG_VERSION"),
            "exportDate": crate::db::now(),
            "stats": stats,
            "data": data,
        })))
}

async fn export_clients_csv(state: web::Data<AppState>) -> Result<HttpResponse> {
    let clients = sqlx::query_as::<_, ClientRow>("SELECT * FROM clients ORDER BY name")
        .fetch_all(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "name",
            "phone",
            "address",
            "city",
            "service_day",
            "monthly_rate",
            "pool_type",
            "language",
            "is_active",
        ])
        .map_err(actix_web::error::ErrorInternalServerError)?;
    for client in &clients {
        writer
            .write_record([
                client.name.as_str(),
                client.phone.as_str(),
                client.address.as_str(),
                client.city.as_str(),
                client.service_day.as_str(),
                &client.monthly_rate.to_string(),
                client.pool_type.as_str(),
                client.language.as_str(),
                if client.is_active { "true" } else { "false" },
            ])
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| actix_web::error::ErrorInternalServerError(err.error().to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/csv")
        .insert_header((
            "Content-Disposition",
            "attachment; filename=\"clients.csv\"",
        ))
        .body(bytes))
}

async fn import_data(
    state: web::Data<AppState>,
    payload: web::Json<serde_json::Value>,
) -> Result<HttpResponse> {
    let outcome = validate_import(&payload);
    if !outcome.valid {
        return Ok(HttpResponse::BadRequest().json(json!({
            "errors": outcome.errors,
            "warnings": outcome.warnings,
        })));
    }

    let Some(data) = outcome.data else {
        return Ok(HttpResponse::InternalServerError()
            .json(json!({ "error": "Validation produced no data" })));
    };
    commit_import(&state.db, &data)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let (fresh, _) = snapshot(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    state.backup.save_debounced(fresh);

    Ok(HttpResponse::Ok().json(json!({
        "imported": outcome.stats,
        "warnings": outcome.warnings,
    })))
}

#[derive(Debug, Deserialize)]
struct PreviewInput {
    text: Option<String>,
    csv: Option<String>,
}

/// Turns pasted free text or a CSV body into client drafts without touching
/// the database.
async fn import_preview(payload: web::Json<PreviewInput>) -> Result<HttpResponse> {
    let input = payload.into_inner();
    if let Some(csv_content) = input.csv.filter(|c| !c.trim().is_empty()) {
        let drafts = parse_clients_csv(&csv_content)
            .map_err(actix_web::error::ErrorBadRequest)?;
        return Ok(HttpResponse::Ok().json(json!({ "clients": drafts })));
    }
    if let Some(text) = input.text.filter(|t| !t.trim().is_empty()) {
        let drafts: Vec<_> = text
            .split("\n\n")
            .filter(|block| !block.trim().is_empty())
            .map(parse_client_text)
            .collect();
        return Ok(HttpResponse::Ok().json(json!({ "clients": drafts })));
    }
    Ok(HttpResponse::BadRequest()
        .json(json!({ "errors": ["Provide either 'text' or 'csv'."] })))
}

async fn backup_status(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.backup.metadata() {
        Some(meta) => Ok(HttpResponse::Ok().json(meta)),
        None => Ok(HttpResponse::Ok().json(json!({ "version": null }))),
    }
}

async fn run_backup(state: web::Data<AppState>) -> Result<HttpResponse> {
    let (data, stats) = snapshot(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;
    let outcome = state.backup.save(&data);
    Ok(HttpResponse::Ok().json(json!({ "saved": outcome, "stats": stats })))
}

async fn recover_backup(state: web::Data<AppState>) -> Result<HttpResponse> {
    match state.backup.recover() {
        Some(recovered) => Ok(HttpResponse::Ok().json(recovered)),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "No backup available" }))),
    }
}

async fn list_versions(state: web::Data<AppState>) -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(state.backup.versions()))
}

async fn get_version(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    match state.backup.version(path.into_inner()) {
        Some(data) => Ok(HttpResponse::Ok().json(data)),
        None => Ok(HttpResponse::NotFound().json(json!({ "error": "Version not found" }))),
    }
}
