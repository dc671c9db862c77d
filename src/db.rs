use std::{env, fs, path::Path};

use chrono::Utc;
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::{
    auth::{hash_password, new_id},
    models::{ClientRow, PaymentRow, ScheduleRow, SettingRow, WorkRow, ROLE_OWNER},
};

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

pub fn now() -> String {
    Utc::now().to_rfc3339()
}

pub fn ensure_sqlite_dir(db_url: &str) -> std::io::Result<()> {
    let path = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"));

    let Some(path) = path else {
        return Ok(());
    };

    let path = path.split('?').next().unwrap_or(path);
    if path == ":memory:" || path.is_empty() {
        return Ok(());
    }

    let path = path.strip_prefix("file:").unwrap_or(path);
    if let Some(parent) = Path::new(path).parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

pub async fn seed_defaults(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    seed_owner(pool).await?;
    seed_sms_templates(pool).await?;
    Ok(())
}

async fn seed_owner(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let existing = sqlx::query_as::<_, (String,)>("SELECT id FROM users WHERE role = ? LIMIT 1")
        .bind(ROLE_OWNER)
        .fetch_optional(pool)
        .await?;

    if existing.is_some() {
        return Ok(());
    }

    let username = env::var("ADMIN_USER").unwrap_or_else(|_| "admin".to_string());
    let password = env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin".to_string());
    let display_name = env::var("ADMIN_DISPLAY_NAME").unwrap_or_else(|_| "Owner".to_string());

    if password == "admin" {
        log::warn!("ADMIN_PASSWORD not set. Using default password 'admin'. Set ADMIN_PASSWORD in production.");
    }

    let password_hash =
        hash_password(&password).map_err(|_| sqlx::Error::Protocol("password hash failed".into()))?;

    sqlx::query(
        r#"INSERT INTO users (id, username, display_name, role, password_hash, active, created_at)
           VALUES (?, ?, ?, ?, ?, 1, ?)"#,
    )
    .bind(new_id())
    .bind(username)
    .bind(display_name)
    .bind(ROLE_OWNER)
    .bind(password_hash)
    .bind(now())
    .execute(pool)
    .await?;

    Ok(())
}

async fn seed_sms_templates(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let templates = vec![
        (
            "payment_reminder_3day",
            "Hi! This is your pool service. Your monthly service payment of ${amount} was due on {date}. Please Zelle payment to: {zelle}. Questions? Call us at {phone}. Thank you!",
            "¡Hola! Le saluda su servicio de piscina. Su pago mensual de servicio de ${amount} venció el {date}. Por favor envíe el pago por Zelle a: {zelle}. ¿Preguntas? Llámenos al {phone}. ¡Gracias!",
        ),
        (
            "work_reminder_7day",
            "Hi! Pool service here. Friendly reminder: your invoice for {work_type} completed on {date} is ready. Amount due: ${amount}. Please Zelle to: {zelle}. Thank you!",
            "¡Hola! Le saluda su servicio de piscina. Recordatorio: su factura por {work_type} completado el {date} está lista. Monto: ${amount}. Por favor envíe por Zelle a: {zelle}. ¡Gracias!",
        ),
        (
            "appointment_confirmation",
            "Reminder from your pool service! We are scheduled to visit tomorrow, {date} at {time} for {service_type}. Address: {address}. Please ensure gate access. Questions? {phone}",
            "¡Recordatorio de su servicio de piscina! Visitaremos mañana, {date} a las {time} para {service_type}. Dirección: {address}. Asegure acceso al portón. ¿Preguntas? {phone}",
        ),
    ];

    for (name, english, spanish) in templates {
        let exists = sqlx::query_as::<_, (String,)>(
            "SELECT id FROM sms_templates WHERE template_name = ? LIMIT 1",
        )
        .bind(name)
        .fetch_optional(pool)
        .await?;
        if exists.is_some() {
            continue;
        }
        sqlx::query(
            r#"INSERT INTO sms_templates (id, template_name, english_message, spanish_message, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)"#,
        )
        .bind(new_id())
        .bind(name)
        .bind(english)
        .bind(spanish)
        .bind(now())
        .bind(now())
        .execute(pool)
        .await?;
    }

    Ok(())
}

pub async fn fetch_payment_with_client(pool: &SqlitePool, id: &str) -> Option<PaymentRow> {
    sqlx::query_as::<_, PaymentRow>(
        r#"SELECT p.*, c.name AS client_name
           FROM payments p
           LEFT JOIN clients c ON p.client_id = c.id
           WHERE p.id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

pub async fn fetch_work_with_client(pool: &SqlitePool, id: &str) -> Option<WorkRow> {
    sqlx::query_as::<_, WorkRow>(
        r#"SELECT w.*, c.name AS client_name
           FROM additional_work w
           LEFT JOIN clients c ON w.client_id = c.id
           WHERE w.id = ?
           LIMIT 1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)
}

pub async fn fetch_client(pool: &SqlitePool, id: &str) -> Option<ClientRow> {
    sqlx::query_as::<_, ClientRow>("SELECT * FROM clients WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .unwrap_or(None)
}

/// Per-table record counts reported alongside exports and backups.
#[derive(Debug, Clone, serde::Serialize, PartialEq, Eq)]
pub struct SnapshotStats {
    pub clients: usize,
    pub payments: usize,
    #[serde(rename = "additionalWork")]
    pub additional_work: usize,
    pub schedule: usize,
}

/// Reads every business table and packages it in the export/backup layout.
pub async fn snapshot(pool: &SqlitePool) -> Result<(Value, SnapshotStats), sqlx::Error> {
    let clients = sqlx::query_as::<_, ClientRow>("SELECT * FROM clients ORDER BY name")
        .fetch_all(pool)
        .await?;
    let payments = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payments ORDER BY invoice_date")
        .fetch_all(pool)
        .await?;
    let work = sqlx::query_as::<_, WorkRow>("SELECT * FROM additional_work ORDER BY work_date")
        .fetch_all(pool)
        .await?;
    let schedule = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM schedule ORDER BY scheduled_date")
        .fetch_all(pool)
        .await?;
    // Automatic backup_* rows are themselves snapshots; carrying them along
    // would nest each day's backup inside the next.
    let settings = sqlx::query_as::<_, SettingRow>(
        "SELECT * FROM app_settings WHERE key NOT LIKE 'backup_%' ORDER BY key",
    )
    .fetch_all(pool)
    .await?;

    let stats = SnapshotStats {
        clients: clients.len(),
        payments: payments.len(),
        additional_work: work.len(),
        schedule: schedule.len(),
    };

    let data = json!({
        "clients": clients,
        "payments": payments,
        "additionalWork": work,
        "schedule": schedule,
        "settings": settings,
    });

    Ok((data, stats))
}
