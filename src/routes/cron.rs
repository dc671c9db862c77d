use actix_web::{web, HttpRequest, HttpResponse, Result};
use serde_json::json;

use crate::{
    db::{now, snapshot},
    domain, mail,
    models::{PAYMENT_REMINDER_DAYS, WORK_REMINDER_DAYS},
    sms,
    state::AppState,
};

use super::messaging::business_vars;
use super::settings::load_settings;

const KEPT_BACKUP_DAYS: i64 = 7;

/// Registered ahead of the authenticated /api scope so the bearer check here
/// is the only gate.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/cron/payment-reminders").route(web::get().to(payment_reminders)),
    )
    .service(web::resource("/api/cron/auto-backup").route(web::get().to(auto_backup)));
}

/// Cron endpoints are not behind the owner login; they carry a shared bearer
/// secret instead. An unset secret disables them entirely.
fn authorized(req: &HttpRequest, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    req.headers()
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .map(|value| value == format!("Bearer {secret}"))
        .unwrap_or(false)
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderPaymentRow {
    id: String,
    due_date: String,
    amount_due: f64,
    amount_paid: f64,
    client_phone: Option<String>,
    client_language: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
struct ReminderWorkRow {
    id: String,
    work_date: String,
    work_type: String,
    parts_cost: f64,
    labor_hours: f64,
    labor_rate: f64,
    amount_paid: f64,
    client_phone: Option<String>,
    client_language: Option<String>,
}

async fn payment_reminders(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !authorized(&req, &state.cron_secret) {
        return Ok(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" })));
    }

    if !state.sms.enabled() {
        log::warn!("Reminder run skipped: SMS gateway not configured");
        return Ok(HttpResponse::Ok().json(json!({
            "sent": 0,
            "skipped": 0,
            "failed": 0,
            "gateway": "disabled",
        })));
    }

    let today = domain::today();
    let (zelle, business_phone) = business_vars(&state.db).await;
    let mut sent = 0u32;
    let mut skipped = 0u32;
    let mut failed = 0u32;

    let payments = sqlx::query_as::<_, ReminderPaymentRow>(
        r#"SELECT p.id, p.due_date, p.amount_due, p.amount_paid,
                  c.phone AS client_phone, c.language AS client_language
           FROM payments p
           LEFT JOIN clients c ON p.client_id = c.id
           WHERE p.reminder_sent = 0 AND p.amount_paid < p.amount_due
             AND c.is_active = 1"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    for row in payments {
        let days = domain::days_overdue(row.amount_due, row.amount_paid, &row.due_date, today);
        if days < PAYMENT_REMINDER_DAYS {
            continue;
        }
        let phone = row.client_phone.unwrap_or_default();
        if phone.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let language = row.client_language.as_deref().unwrap_or("en");
        let Some(template) =
            sms::fetch_template(&state.db, "payment_reminder_3day", language).await
        else {
            skipped += 1;
            continue;
        };
        let body = sms::format_message(
            &template,
            &[
                ("amount", format!("{:.2}", domain::balance(row.amount_due, row.amount_paid))),
                ("date", row.due_date.clone()),
                ("zelle", zelle.clone()),
                ("phone", business_phone.clone()),
            ],
        );
        match sms::send_sms(&state.sms, &phone, &body).await {
            Ok(true) => {
                mark_payment_sent(&state.db, &row.id)
                    .await
                    .map_err(actix_web::error::ErrorInternalServerError)?;
                sent += 1;
            }
            Ok(false) => skipped += 1,
            Err(err) => {
                log::error!("Payment reminder {} failed: {err}", row.id);
                failed += 1;
            }
        }
    }

    let work = sqlx::query_as::<_, ReminderWorkRow>(
        r#"SELECT w.id, w.work_date, w.work_type, w.parts_cost, w.labor_hours,
                  w.labor_rate, w.amount_paid,
                  c.phone AS client_phone, c.language AS client_language
           FROM additional_work w
           LEFT JOIN clients c ON w.client_id = c.id
           WHERE w.reminder_sent = 0
             AND w.amount_paid < w.parts_cost + w.labor_hours * w.labor_rate
             AND c.is_active = 1"#,
    )
    .fetch_all(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    for row in work {
        let total = domain::total_charge(row.parts_cost, row.labor_hours, row.labor_rate);
        let days = domain::days_overdue(total, row.amount_paid, &row.work_date, today);
        if days < WORK_REMINDER_DAYS {
            continue;
        }
        let phone = row.client_phone.unwrap_or_default();
        if phone.trim().is_empty() {
            skipped += 1;
            continue;
        }
        let language = row.client_language.as_deref().unwrap_or("en");
        let Some(template) = sms::fetch_template(&state.db, "work_reminder_7day", language).await
        else {
            skipped += 1;
            continue;
        };
        let body = sms::format_message(
            &template,
            &[
                ("amount", format!("{:.2}", domain::balance(total, row.amount_paid))),
                ("date", row.work_date.clone()),
                ("work_type", row.work_type.replace('_', " ")),
                ("zelle", zelle.clone()),
                ("phone", business_phone.clone()),
            ],
        );
        match sms::send_sms(&state.sms, &phone, &body).await {
            Ok(true) => {
                mark_work_sent(&state.db, &row.id)
                    .await
                    .map_err(actix_web::error::ErrorInternalServerError)?;
                sent += 1;
            }
            Ok(false) => skipped += 1,
            Err(err) => {
                log::error!("Work reminder {} failed: {err}", row.id);
                failed += 1;
            }
        }
    }

    log::info!("Reminder run complete: sent={sent} skipped={skipped} failed={failed}");
    Ok(HttpResponse::Ok().json(json!({
        "sent": sent,
        "skipped": skipped,
        "failed": failed,
        "gateway": "enabled",
    })))
}

async fn mark_payment_sent(pool: &sqlx::SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    let ts = now();
    sqlx::query(
        "UPDATE payments SET reminder_sent = 1, reminder_sent_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&ts)
    .bind(&ts)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

async fn mark_work_sent(pool: &sqlx::SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    let ts = now();
    sqlx::query(
        "UPDATE additional_work SET reminder_sent = 1, reminder_sent_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&ts)
    .bind(&ts)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Nightly snapshot. One settings row per day, pruned after a week, plus the
/// local two-layer backup and an optional summary email to the owner.
async fn auto_backup(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse> {
    if !authorized(&req, &state.cron_secret) {
        return Ok(HttpResponse::Unauthorized().json(json!({ "error": "Unauthorized" })));
    }

    let (data, stats) = snapshot(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?;

    let today = domain::today();
    let key = format!("backup_{today}");
    let ts = now();
    sqlx::query(
        r#"INSERT INTO app_settings (key, value, created_at, updated_at)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
    )
    .bind(&key)
    .bind(data.to_string())
    .bind(&ts)
    .bind(&ts)
    .execute(&state.db)
    .await
    .map_err(actix_web::error::ErrorInternalServerError)?;

    let cutoff = (today - chrono::Duration::days(KEPT_BACKUP_DAYS)).format("%Y-%m-%d");
    let pruned = sqlx::query("DELETE FROM app_settings WHERE key LIKE 'backup_%' AND key < ?")
        .bind(format!("backup_{cutoff}"))
        .execute(&state.db)
        .await
        .map_err(actix_web::error::ErrorInternalServerError)?
        .rows_affected();

    let saved = state.backup.save(&data);

    let mut email_sent = false;
    if state.mail.enabled() {
        let settings = load_settings(&state.db).await;
        let recipient = settings
            .get("notification_email")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or_else(|| std::env::var("BACKUP_SUMMARY_EMAIL").ok());
        if let Some(to) = recipient {
            let html = format!(
                "<p>Nightly backup for {today} completed.</p>\
                 <p>Clients: {}, payments: {}, work orders: {}, schedule entries: {}.</p>",
                stats.clients, stats.payments, stats.additional_work, stats.schedule
            );
            match mail::send_email(&state.mail, &to, "Nightly backup summary", &html).await {
                Ok(sent) => email_sent = sent,
                Err(err) => log::error!("Backup summary email failed: {err}"),
            }
        }
    }

    Ok(HttpResponse::Ok().json(json!({
        "key": key,
        "stats": stats,
        "pruned": pruned,
        "saved": saved,
        "email_sent": email_sent,
    })))
}
