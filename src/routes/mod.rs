pub mod backup;
pub mod clients;
pub mod cron;
pub mod messaging;
pub mod payments;
pub mod schedule;
pub mod settings;
pub mod work;

use actix_web::{web, HttpResponse};
use serde_json::json;

/// Everything under /api requires the owner login; cron routes carry their
/// own bearer secret and are mounted separately.
pub fn configure_api(cfg: &mut web::ServiceConfig) {
    clients::configure(cfg);
    payments::configure(cfg);
    work::configure(cfg);
    schedule::configure(cfg);
    settings::configure(cfg);
    messaging::configure(cfg);
    backup::configure(cfg);
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}
