use serde::Serialize;

pub const ROLE_OWNER: &str = "owner";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_PAID: &str = "paid";
pub const STATUS_OVERDUE: &str = "overdue";

pub const SERVICE_DAYS: &[&str] = &["monday", "tuesday", "wednesday", "thursday", "friday"];
pub const POOL_TYPES: &[&str] = &["chlorine", "salt", "other"];
pub const LANGUAGES: &[&str] = &["en", "es"];
pub const PAYMENT_METHODS: &[&str] = &["zelle", "check", "cash", "venmo"];
pub const SERVICE_TYPES: &[&str] = &["regular", "additional_work", "estimate"];
pub const SCHEDULE_STATUSES: &[&str] = &["scheduled", "completed", "cancelled", "rescheduled"];

pub const WORK_TYPES: &[&str] = &[
    "motor_replacement",
    "pool_light",
    "pump_repair",
    "filter_replacement",
    "heater_repair",
    "tile_coping_repair",
    "resurfacing",
    "leak_detection",
    "leak_repair",
    "equipment_upgrade",
    "construction_project",
    "deck_repair",
    "safety_cover",
    "pool_cover",
    "valve_replacement",
    "salt_cell_replacement",
    "automation_system",
    "other",
];

pub const DEFAULT_LABOR_RATE: f64 = 75.0;
/// Days after the invoice date before a monthly payment falls due.
pub const PAYMENT_TERMS_DAYS: i64 = 30;
/// A payment reminder goes out once an invoice is at least this overdue.
pub const PAYMENT_REMINDER_DAYS: i64 = 3;
/// A work-order reminder goes out once the invoice is at least this overdue.
pub const WORK_REMINDER_DAYS: i64 = 7;

#[allow(dead_code)]
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub password_hash: String,
    pub active: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ClientRow {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub gate_code: Option<String>,
    pub service_day: String,
    pub monthly_rate: f64,
    pub pool_type: String,
    pub is_active: bool,
    pub language: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PaymentRow {
    pub id: String,
    pub client_id: String,
    pub invoice_date: String,
    pub due_date: String,
    pub amount_due: f64,
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkRow {
    pub id: String,
    pub client_id: String,
    pub work_date: String,
    pub work_type: String,
    pub description: Option<String>,
    pub parts_cost: f64,
    pub labor_hours: f64,
    pub labor_rate: f64,
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub invoice_sent: bool,
    pub invoice_sent_at: Option<String>,
    pub reminder_sent: bool,
    pub reminder_sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ScheduleRow {
    pub id: String,
    pub client_id: String,
    pub scheduled_date: String,
    pub scheduled_time: Option<String>,
    pub service_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub confirmation_sent: bool,
    pub confirmation_sent_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_name: Option<String>,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_address: Option<String>,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_city: Option<String>,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_gate_code: Option<String>,
    #[serde(skip_serializing)]
    #[sqlx(default)]
    pub client_phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Slim client reference embedded in payment and work-order responses.
#[derive(Debug, Clone, Serialize)]
pub struct ClientRef {
    pub id: String,
    pub name: String,
}
