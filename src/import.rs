//! Bulk import: heuristic extraction of client drafts from OCR text or CSV,
//! and all-or-nothing validation of full backup payloads before anything is
//! written to the database.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;

use crate::{
    auth::new_id,
    db::{now, SnapshotStats},
    domain::default_due_date,
    models::{
        DEFAULT_LABOR_RATE, LANGUAGES, PAYMENT_METHODS, POOL_TYPES, SCHEDULE_STATUSES,
        SERVICE_DAYS, SERVICE_TYPES, WORK_TYPES,
    },
};

const DEFAULT_CITY: &str = "Miami";
const DEFAULT_MONTHLY_RATE: f64 = 150.0;
const DEFAULT_SERVICE_DAY: &str = "monday";

fn name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Z][a-z]+(\s[A-Z][a-z]+)+$").expect("hard-coded regex"))
}

fn address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d+\s+[A-Za-z]+").expect("hard-coded regex"))
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}").expect("hard-coded regex")
    })
}

/// A best-guess client draft produced by the heuristics. Never persisted
/// directly; the caller reviews and submits through the normal create path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientDraft {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub monthly_rate: f64,
    pub service_day: String,
}

impl Default for ClientDraft {
    fn default() -> Self {
        Self {
            name: String::new(),
            phone: String::new(),
            address: String::new(),
            city: DEFAULT_CITY.to_string(),
            monthly_rate: DEFAULT_MONTHLY_RATE,
            service_day: DEFAULT_SERVICE_DAY.to_string(),
        }
    }
}

/// Line-by-line pattern matching in priority order, first match wins: a line
/// of capitalized words becomes the name, a line starting with digits the
/// address, and the first phone-shaped substring anywhere the phone.
pub fn parse_client_text(text: &str) -> ClientDraft {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut draft = ClientDraft::default();

    for line in &lines {
        if name_re().is_match(line) && !line.chars().any(|c| c.is_ascii_digit()) {
            draft.name = line.to_string();
            break;
        }
    }

    for line in &lines {
        if address_re().is_match(line) {
            draft.address = line.to_string();
            break;
        }
    }

    if let Some(found) = phone_re().find(text) {
        draft.phone = found.as_str().to_string();
    }

    draft
}

/// CSV import with English/Spanish header aliases and positional fallback.
/// Rows without a name are skipped.
pub fn parse_clients_csv(content: &str) -> Result<Vec<ClientDraft>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.to_lowercase())
        .collect();

    let column = |aliases: &[&str]| -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| headers.iter().position(|h| h == alias))
    };

    let name_col = column(&["name", "nombre"]);
    let phone_col = column(&["phone", "telefono"]);
    let address_col = column(&["address", "direccion"]);
    let city_col = column(&["city", "ciudad"]);
    let rate_col = column(&["rate", "tarifa"]);
    let day_col = column(&["day", "dia"]);

    let mut drafts = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cell = |col: Option<usize>, fallback: usize| -> String {
            col.or(Some(fallback))
                .and_then(|i| record.get(i))
                .unwrap_or_default()
                .trim()
                .to_string()
        };

        let name = cell(name_col, 0);
        if name.is_empty() {
            continue;
        }

        let city = cell(city_col, usize::MAX);
        let rate = cell(rate_col, usize::MAX).parse::<f64>().ok();
        let day = cell(day_col, usize::MAX);

        drafts.push(ClientDraft {
            name,
            phone: cell(phone_col, 1),
            address: cell(address_col, 2),
            city: if city.is_empty() { DEFAULT_CITY.to_string() } else { city },
            monthly_rate: rate.unwrap_or(DEFAULT_MONTHLY_RATE),
            service_day: if day.is_empty() { DEFAULT_SERVICE_DAY.to_string() } else { day },
        });
    }

    Ok(drafts)
}

// --- Full-backup import validation -----------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ImportClient {
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
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPayment {
    pub id: String,
    pub client_id: String,
    pub invoice_date: String,
    pub due_date: String,
    pub amount_due: f64,
    pub amount_paid: f64,
    pub payment_date: Option<String>,
    pub payment_method: Option<String>,
    pub reminder_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportWork {
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
    pub reminder_sent: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportScheduleEntry {
    pub id: String,
    pub client_id: String,
    pub scheduled_date: String,
    pub scheduled_time: Option<String>,
    pub service_type: String,
    pub status: String,
    pub notes: Option<String>,
    pub confirmation_sent: bool,
}

#[derive(Debug, Default)]
pub struct ImportData {
    pub clients: Vec<ImportClient>,
    pub payments: Vec<ImportPayment>,
    pub additional_work: Vec<ImportWork>,
    pub schedule: Vec<ImportScheduleEntry>,
}

/// Outcome of validating a backup payload. `data` is present only when the
/// whole payload validated; a single bad record rejects the batch.
pub struct ValidationOutcome {
    pub valid: bool,
    pub data: Option<ImportData>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub stats: Option<SnapshotStats>,
}

struct Record<'a> {
    value: &'a Value,
    path: String,
    errors: Vec<String>,
}

impl<'a> Record<'a> {
    fn new(value: &'a Value, table: &str, index: usize) -> Self {
        Self {
            value,
            path: format!("{table}.{index}"),
            errors: Vec::new(),
        }
    }

    fn fail(&mut self, field: &str, message: &str) {
        self.errors.push(format!("{}.{field}: {message}", self.path));
    }

    fn required_str(&mut self, field: &str) -> String {
        match self.value.get(field).and_then(Value::as_str) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => {
                self.fail(field, "required");
                String::new()
            }
        }
    }

    fn optional_str(&mut self, field: &str) -> Option<String> {
        match self.value.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => {
                self.fail(field, "expected a string");
                None
            }
        }
    }

    fn str_or(&mut self, field: &str, default: &str) -> String {
        self.optional_str(field)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn required_amount(&mut self, field: &str) -> f64 {
        match self.value.get(field).and_then(Value::as_f64) {
            Some(n) if n >= 0.0 => n,
            Some(_) => {
                self.fail(field, "must not be negative");
                0.0
            }
            None => {
                self.fail(field, "required");
                0.0
            }
        }
    }

    fn amount_or(&mut self, field: &str, default: f64) -> f64 {
        match self.value.get(field) {
            None | Some(Value::Null) => default,
            Some(value) => match value.as_f64() {
                Some(n) if n >= 0.0 => n,
                Some(_) => {
                    self.fail(field, "must not be negative");
                    default
                }
                None => {
                    self.fail(field, "expected a number");
                    default
                }
            },
        }
    }

    fn bool_or(&mut self, field: &str, default: bool) -> bool {
        match self.value.get(field) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(_) => {
                self.fail(field, "expected a boolean");
                default
            }
        }
    }

    fn one_of(&mut self, field: &str, allowed: &[&str], value: &str) {
        if !allowed.contains(&value) {
            self.fail(field, &format!("must be one of: {}", allowed.join(", ")));
        }
    }

    fn optional_one_of(&mut self, field: &str, allowed: &[&str]) -> Option<String> {
        let value = self.optional_str(field)?;
        if !allowed.contains(&value.as_str()) {
            self.fail(field, &format!("must be one of: {}", allowed.join(", ")));
            return None;
        }
        Some(value)
    }

    fn id(&mut self) -> String {
        self.optional_str("id")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(new_id)
    }
}

fn table_items<'a>(payload: &'a Value, keys: &[&str], errors: &mut Vec<String>) -> Vec<&'a Value> {
    for key in keys {
        match payload.get(*key) {
            None => continue,
            Some(Value::Array(items)) => return items.iter().collect(),
            Some(_) => {
                errors.push(format!("{key}: expected an array"));
                return Vec::new();
            }
        }
    }
    Vec::new()
}

fn validate_client(record: &mut Record<'_>) -> ImportClient {
    let client = ImportClient {
        id: record.id(),
        name: record.required_str("name"),
        phone: record.required_str("phone"),
        address: record.required_str("address"),
        city: record.str_or("city", ""),
        gate_code: record.optional_str("gate_code"),
        service_day: record.required_str("service_day"),
        monthly_rate: record.required_amount("monthly_rate"),
        pool_type: record.str_or("pool_type", "chlorine"),
        is_active: record.bool_or("is_active", true),
        language: record.str_or("language", "en"),
        notes: record.optional_str("notes"),
    };
    record.one_of("service_day", SERVICE_DAYS, &client.service_day);
    record.one_of("pool_type", POOL_TYPES, &client.pool_type);
    record.one_of("language", LANGUAGES, &client.language);
    client
}

fn validate_payment(record: &mut Record<'_>) -> ImportPayment {
    let invoice_date = record.required_str("invoice_date");
    ImportPayment {
        id: record.id(),
        client_id: record.required_str("client_id"),
        due_date: record.str_or("due_date", &default_due_date(&invoice_date)),
        invoice_date,
        amount_due: record.required_amount("amount_due"),
        amount_paid: record.amount_or("amount_paid", 0.0),
        payment_date: record.optional_str("payment_date"),
        payment_method: record.optional_one_of("payment_method", PAYMENT_METHODS),
        reminder_sent: record.bool_or("reminder_sent", false),
    }
}

fn validate_work(record: &mut Record<'_>) -> ImportWork {
    let work = ImportWork {
        id: record.id(),
        client_id: record.required_str("client_id"),
        work_date: record.required_str("work_date"),
        work_type: record.required_str("work_type"),
        description: record.optional_str("description"),
        parts_cost: record.amount_or("parts_cost", 0.0),
        labor_hours: record.amount_or("labor_hours", 0.0),
        labor_rate: record.amount_or("labor_rate", DEFAULT_LABOR_RATE),
        amount_paid: record.amount_or("amount_paid", 0.0),
        payment_date: record.optional_str("payment_date"),
        payment_method: record.optional_one_of("payment_method", PAYMENT_METHODS),
        invoice_sent: record.bool_or("invoice_sent", false),
        reminder_sent: record.bool_or("reminder_sent", false),
    };
    record.one_of("work_type", WORK_TYPES, &work.work_type);
    work
}

fn validate_schedule_entry(record: &mut Record<'_>) -> ImportScheduleEntry {
    let entry = ImportScheduleEntry {
        id: record.id(),
        client_id: record.required_str("client_id"),
        scheduled_date: record.required_str("scheduled_date"),
        scheduled_time: record.optional_str("scheduled_time"),
        service_type: record.str_or("service_type", "regular"),
        status: record.str_or("status", "scheduled"),
        notes: record.optional_str("notes"),
        confirmation_sent: record.bool_or("confirmation_sent", false),
    };
    record.one_of("service_type", SERVICE_TYPES, &entry.service_type);
    record.one_of("status", SCHEDULE_STATUSES, &entry.status);
    entry
}

/// Validates a full backup payload. All-or-nothing: any record error rejects
/// the batch; warnings (orphaned references) never do.
pub fn validate_import(payload: &Value) -> ValidationOutcome {
    if !payload.is_object() {
        return ValidationOutcome {
            valid: false,
            data: None,
            errors: vec!["Invalid data format: expected an object".to_string()],
            warnings: Vec::new(),
            stats: None,
        };
    }

    let mut errors = Vec::new();
    let mut data = ImportData::default();

    for (index, item) in table_items(payload, &["clients"], &mut errors).into_iter().enumerate() {
        let mut record = Record::new(item, "clients", index);
        let client = validate_client(&mut record);
        errors.append(&mut record.errors);
        data.clients.push(client);
    }
    for (index, item) in table_items(payload, &["payments"], &mut errors).into_iter().enumerate() {
        let mut record = Record::new(item, "payments", index);
        let payment = validate_payment(&mut record);
        errors.append(&mut record.errors);
        data.payments.push(payment);
    }
    for (index, item) in
        table_items(payload, &["additionalWork", "additional_work"], &mut errors)
            .into_iter()
            .enumerate()
    {
        let mut record = Record::new(item, "additionalWork", index);
        let work = validate_work(&mut record);
        errors.append(&mut record.errors);
        data.additional_work.push(work);
    }
    for (index, item) in table_items(payload, &["schedule"], &mut errors).into_iter().enumerate() {
        let mut record = Record::new(item, "schedule", index);
        let entry = validate_schedule_entry(&mut record);
        errors.append(&mut record.errors);
        data.schedule.push(entry);
    }

    if !errors.is_empty() {
        return ValidationOutcome {
            valid: false,
            data: None,
            errors,
            warnings: Vec::new(),
            stats: None,
        };
    }

    let client_ids: HashSet<&str> = data.clients.iter().map(|c| c.id.as_str()).collect();
    let mut warnings = Vec::new();
    for payment in &data.payments {
        if !client_ids.contains(payment.client_id.as_str()) {
            warnings.push(format!("Payment references unknown client: {}", payment.client_id));
        }
    }
    for work in &data.additional_work {
        if !client_ids.contains(work.client_id.as_str()) {
            warnings.push(format!("Work order references unknown client: {}", work.client_id));
        }
    }
    for entry in &data.schedule {
        if !client_ids.contains(entry.client_id.as_str()) {
            warnings.push(format!(
                "Schedule entry references unknown client: {}",
                entry.client_id
            ));
        }
    }

    let stats = SnapshotStats {
        clients: data.clients.len(),
        payments: data.payments.len(),
        additional_work: data.additional_work.len(),
        schedule: data.schedule.len(),
    };

    ValidationOutcome {
        valid: true,
        data: Some(data),
        errors: Vec::new(),
        warnings,
        stats: Some(stats),
    }
}

/// Writes a validated payload in a single transaction.
pub async fn commit_import(pool: &SqlitePool, data: &ImportData) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    let ts = now();

    for client in &data.clients {
        sqlx::query(
            r#"INSERT INTO clients
               (id, name, phone, address, city, gate_code, service_day, monthly_rate,
                pool_type, is_active, language, notes, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&client.id)
        .bind(&client.name)
        .bind(&client.phone)
        .bind(&client.address)
        .bind(&client.city)
        .bind(&client.gate_code)
        .bind(&client.service_day)
        .bind(client.monthly_rate)
        .bind(&client.pool_type)
        .bind(client.is_active)
        .bind(&client.language)
        .bind(&client.notes)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;
    }

    for payment in &data.payments {
        sqlx::query(
            r#"INSERT INTO payments
               (id, client_id, invoice_date, due_date, amount_due, amount_paid,
                payment_date, payment_method, reminder_sent, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&payment.id)
        .bind(&payment.client_id)
        .bind(&payment.invoice_date)
        .bind(&payment.due_date)
        .bind(payment.amount_due)
        .bind(payment.amount_paid)
        .bind(&payment.payment_date)
        .bind(&payment.payment_method)
        .bind(payment.reminder_sent)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;
    }

    for work in &data.additional_work {
        sqlx::query(
            r#"INSERT INTO additional_work
               (id, client_id, work_date, work_type, description, parts_cost, labor_hours,
                labor_rate, amount_paid, payment_date, payment_method, invoice_sent,
                reminder_sent, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&work.id)
        .bind(&work.client_id)
        .bind(&work.work_date)
        .bind(&work.work_type)
        .bind(&work.description)
        .bind(work.parts_cost)
        .bind(work.labor_hours)
        .bind(work.labor_rate)
        .bind(work.amount_paid)
        .bind(&work.payment_date)
        .bind(&work.payment_method)
        .bind(work.invoice_sent)
        .bind(work.reminder_sent)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;
    }

    for entry in &data.schedule {
        sqlx::query(
            r#"INSERT INTO schedule
               (id, client_id, scheduled_date, scheduled_time, service_type, status,
                notes, confirmation_sent, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(&entry.id)
        .bind(&entry.client_id)
        .bind(&entry.scheduled_date)
        .bind(&entry.scheduled_time)
        .bind(&entry.service_type)
        .bind(&entry.status)
        .bind(&entry.notes)
        .bind(entry.confirmation_sent)
        .bind(&ts)
        .bind(&ts)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}
