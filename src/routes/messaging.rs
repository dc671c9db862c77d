use actix_web::{web, HttpResponse, Result};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    db::now,
    domain, sms,
    state::AppState,
};

use super::settings::load_settings;

#[derive(Debug, Deserialize)]
pub struct SendSmsInput {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub template_name: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/sms/send").route(web::post().to(send_reminder)));
}

/// Business contact details substituted into every template. Settings win
/// over environment variables so the owner can change them from the app.
pub async fn business_vars(pool: &SqlitePool) -> (String, String) {
    let settings = load_settings(pool).await;
    let zelle = settings
        .get("zelle")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| std::env::var("ZELLE_EMAIL").ok())
        .unwrap_or_default();
    let phone = settings
        .get("business_phone")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| std::env::var("BUSINESS_PHONE").ok())
        .unwrap_or_default();
    (zelle, phone)
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentTarget {
    due_date: String,
    amount_due: f64,
    amount_paid: f64,
    client_phone: Option<String>,
    client_language: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct WorkTarget {
    work_date: String,
    work_type: String,
    parts_cost: f64,
    labor_hours: f64,
    labor_rate: f64,
    amount_paid: f64,
    client_phone: Option<String>,
    client_language: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ScheduleTarget {
    scheduled_date: String,
    scheduled_time: Option<String>,
    service_type: String,
    client_phone: Option<String>,
    client_language: Option<String>,
    client_address: Option<String>,
}

async fn send_reminder(
    state: web::Data<AppState>,
    payload: web::Json<SendSmsInput>,
) -> Result<HttpResponse> {
    let input = payload.into_inner();
    let (zelle, business_phone) = business_vars(&state.db).await;

    let prepared = match input.kind.as_str() {
        "payment" => prepare_payment(&state.db, &input, &zelle, &business_phone).await,
        "work" => prepare_work(&state.db, &input, &zelle, &business_phone).await,
        "schedule" => prepare_schedule(&state.db, &input, &business_phone).await,
        other => {
            return Ok(HttpResponse::BadRequest().json(json!({
                "errors": [format!("Unknown message type: {other}")]
            })))
        }
    };
    let prepared = prepared.map_err(actix_web::error::ErrorInternalServerError)?;

    let Some(prepared) = prepared else {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Record not found" })));
    };
    if prepared.phone.trim().is_empty() {
        return Ok(HttpResponse::BadRequest()
            .json(json!({ "errors": ["Client has no phone number."] })));
    }
    let Some(body) = prepared.body else {
        return Ok(HttpResponse::NotFound().json(json!({ "error": "Template not found" })));
    };

    let sent = sms::send_sms(&state.sms, &prepared.phone, &body)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    if sent {
        mark_sent(&state.db, &input.kind, &input.id)
            .await
            .map_err(actix_web::error::ErrorInternalServerError)?;
    }

    Ok(HttpResponse::Ok().json(json!({ "sent": sent, "message": body })))
}

struct PreparedMessage {
    phone: String,
    body: Option<String>,
}

async fn prepare_payment(
    pool: &SqlitePool,
    input: &SendSmsInput,
    zelle: &str,
    business_phone: &str,
) -> Result<Option<PreparedMessage>, sqlx::Error> {
    let target = sqlx::query_as::<_, PaymentTarget>(
        r#"SELECT p.due_date, p.amount_due, p.amount_paid,
                  c.phone AS client_phone, c.language AS client_language
           FROM payments p
           LEFT JOIN clients c ON p.client_id = c.id
           WHERE p.id = ?
           LIMIT 1"#,
    )
    .bind(&input.id)
    .fetch_optional(pool)
    .await?;
    let Some(target) = target else {
        return Ok(None);
    };

    let template_name = input.template_name.as_deref().unwrap_or("payment_reminder_3day");
    let language = target.client_language.as_deref().unwrap_or("en");
    let body = match sms::fetch_template(pool, template_name, language).await {
        Some(template) => Some(sms::format_message(
            &template,
            &[
                ("amount", format!("{:.2}", domain::balance(target.amount_due, target.amount_paid))),
                ("date", target.due_date.clone()),
                ("zelle", zelle.to_string()),
                ("phone", business_phone.to_string()),
            ],
        )),
        None => None,
    };
    Ok(Some(PreparedMessage {
        phone: target.client_phone.unwrap_or_default(),
        body,
    }))
}

async fn prepare_work(
    pool: &SqlitePool,
    input: &SendSmsInput,
    zelle: &str,
    business_phone: &str,
) -> Result<Option<PreparedMessage>, sqlx::Error> {
    let target = sqlx::query_as::<_, WorkTarget>(
        r#"SELECT w.work_date, w.work_type, w.parts_cost, w.labor_hours, w.labor_rate,
                  w.amount_paid, c.phone AS client_phone, c.language AS client_language
           FROM additional_work w
           LEFT JOIN clients c ON w.client_id = c.id
           WHERE w.id = ?
           LIMIT 1"#,
    )
    .bind(&input.id)
    .fetch_optional(pool)
    .await?;
    let Some(target) = target else {
        return Ok(None);
    };

    let total = domain::total_charge(target.parts_cost, target.labor_hours, target.labor_rate);
    let template_name = input.template_name.as_deref().unwrap_or("work_reminder_7day");
    let language = target.client_language.as_deref().unwrap_or("en");
    let body = match sms::fetch_template(pool, template_name, language).await {
        Some(template) => Some(sms::format_message(
            &template,
            &[
                ("amount", format!("{:.2}", domain::balance(total, target.amount_paid))),
                ("date", target.work_date.clone()),
                ("work_type", target.work_type.replace('_', " ")),
                ("zelle", zelle.to_string()),
                ("phone", business_phone.to_string()),
            ],
        )),
        None => None,
    };
    Ok(Some(PreparedMessage {
        phone: target.client_phone.unwrap_or_default(),
        body,
    }))
}

async fn prepare_schedule(
    pool: &SqlitePool,
    input: &SendSmsInput,
    business_phone: &str,
) -> Result<Option<PreparedMessage>, sqlx::Error> {
    let target = sqlx::query_as::<_, ScheduleTarget>(
        r#"SELECT s.scheduled_date, s.scheduled_time, s.service_type,
                  c.phone AS client_phone, c.language AS client_language,
                  c.address AS client_address
           FROM schedule s
           LEFT JOIN clients c ON s.client_id = c.id
           WHERE s.id = ?
           LIMIT 1"#,
    )
    .bind(&input.id)
    .fetch_optional(pool)
    .await?;
    let Some(target) = target else {
        return Ok(None);
    };

    let template_name = input
        .template_name
        .as_deref()
        .unwrap_or("appointment_confirmation");
    let language = target.client_language.as_deref().unwrap_or("en");
    let body = match sms::fetch_template(pool, template_name, language).await {
        Some(template) => Some(sms::format_message(
            &template,
            &[
                ("date", target.scheduled_date.clone()),
                ("time", target.scheduled_time.clone().unwrap_or_else(|| "9:00 AM".to_string())),
                ("service_type", target.service_type.clone()),
                ("address", target.client_address.clone().unwrap_or_default()),
                ("phone", business_phone.to_string()),
            ],
        )),
        None => None,
    };
    Ok(Some(PreparedMessage {
        phone: target.client_phone.unwrap_or_default(),
        body,
    }))
}

/// Flags are only flipped after the gateway accepted the message.
async fn mark_sent(pool: &SqlitePool, kind: &str, id: &str) -> Result<(), sqlx::Error> {
    let ts = now();
    let sql = match kind {
        "payment" => {
            "UPDATE payments SET reminder_sent = 1, reminder_sent_at = ?, updated_at = ? WHERE id = ?"
        }
        "work" => {
            "UPDATE additional_work SET reminder_sent = 1, reminder_sent_at = ?, updated_at = ? WHERE id = ?"
        }
        _ => {
            "UPDATE schedule SET confirmation_sent = 1, confirmation_sent_at = ?, updated_at = ? WHERE id = ?"
        }
    };
    sqlx::query(sql)
        .bind(&ts)
        .bind(&ts)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}
