//! Derived billing fields. Status, balance, and days overdue are computed at
//! read time so a stored row never goes stale against the calendar.

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{PAYMENT_TERMS_DAYS, STATUS_OVERDUE, STATUS_PAID, STATUS_PENDING};

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parses a stored date column. Columns hold either `YYYY-MM-DD` or a full
/// RFC 3339 timestamp; only the date part matters for billing.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Payment status: paid once the balance is covered, overdue once the due
/// date has passed with a balance remaining, pending otherwise. An
/// unparseable due date never counts as overdue.
pub fn payment_status(amount_due: f64, amount_paid: f64, due_date: &str, today: NaiveDate) -> &'static str {
    if amount_paid >= amount_due {
        return STATUS_PAID;
    }
    match parse_date(due_date) {
        Some(due) if due < today => STATUS_OVERDUE,
        _ => STATUS_PENDING,
    }
}

/// Whole days past the due date, zero for paid or not-yet-due records.
pub fn days_overdue(amount_due: f64, amount_paid: f64, due_date: &str, today: NaiveDate) -> i64 {
    if amount_paid >= amount_due {
        return 0;
    }
    match parse_date(due_date) {
        Some(due) if due < today => (today - due).num_days(),
        _ => 0,
    }
}

pub fn total_charge(parts_cost: f64, labor_hours: f64, labor_rate: f64) -> f64 {
    parts_cost + labor_hours * labor_rate
}

pub fn balance(amount_due: f64, amount_paid: f64) -> f64 {
    (amount_due - amount_paid).max(0.0)
}

/// Default due date for a monthly invoice: net-30 from the invoice date.
/// Falls back to the invoice date itself when it cannot be parsed.
pub fn default_due_date(invoice_date: &str) -> String {
    match parse_date(invoice_date) {
        Some(date) => (date + Duration::days(PAYMENT_TERMS_DAYS)).format("%Y-%m-%d").to_string(),
        None => invoice_date.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn paid_when_amount_covers_due() {
        let today = day("2026-03-10");
        assert_eq!(payment_status(150.5, 150.5, "2026-01-01", today), STATUS_PAID);
        assert_eq!(payment_status(150.5, 200.0, "2026-01-01", today), STATUS_PAID);
    }

    #[test]
    fn overdue_only_when_past_due_and_unpaid() {
        let today = day("2026-03-10");
        assert_eq!(payment_status(150.5, 0.0, "2026-03-09", today), STATUS_OVERDUE);
        assert_eq!(payment_status(150.5, 0.0, "2026-03-10", today), STATUS_PENDING);
        assert_eq!(payment_status(150.5, 0.0, "2026-03-11", today), STATUS_PENDING);
        assert_eq!(payment_status(150.5, 150.5, "2026-03-09", today), STATUS_PAID);
    }

    #[test]
    fn partial_payment_still_goes_overdue() {
        let today = day("2026-03-10");
        assert_eq!(payment_status(100.0, 40.0, "2026-03-01", today), STATUS_OVERDUE);
        assert_eq!(days_overdue(100.0, 40.0, "2026-03-01", today), 9);
    }

    #[test]
    fn days_overdue_zero_when_paid_or_current() {
        let today = day("2026-03-10");
        assert_eq!(days_overdue(100.0, 100.0, "2026-01-01", today), 0);
        assert_eq!(days_overdue(100.0, 0.0, "2026-03-10", today), 0);
        assert_eq!(days_overdue(100.0, 0.0, "2026-04-01", today), 0);
    }

    #[test]
    fn unparseable_due_date_is_pending() {
        let today = day("2026-03-10");
        assert_eq!(payment_status(100.0, 0.0, "soon", today), STATUS_PENDING);
        assert_eq!(days_overdue(100.0, 0.0, "soon", today), 0);
    }

    #[test]
    fn timestamp_columns_parse_by_date_part() {
        assert_eq!(parse_date("2026-03-01T08:30:00Z"), Some(day("2026-03-01")));
        assert_eq!(parse_date("2026-03-01"), Some(day("2026-03-01")));
        assert_eq!(parse_date("march"), None);
    }

    #[test]
    fn total_charge_is_parts_plus_labor() {
        assert_eq!(total_charge(120.0, 2.0, 75.0), 270.0);
        assert_eq!(total_charge(0.0, 0.0, 75.0), 0.0);
        assert_eq!(total_charge(49.99, 1.5, 80.0), 49.99 + 1.5 * 80.0);
    }

    #[test]
    fn balance_never_negative() {
        assert_eq!(balance(100.0, 30.0), 70.0);
        assert_eq!(balance(100.0, 130.0), 0.0);
    }

    #[test]
    fn net_30_default_due_date() {
        assert_eq!(default_due_date("2026-01-15"), "2026-02-14");
        assert_eq!(default_due_date("not-a-date"), "not-a-date");
    }
}
