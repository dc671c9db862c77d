//! Outbound SMS. Message bodies come from the seeded `sms_templates` table in
//! the client's language and use `{placeholder}` substitution; delivery
//! goes through the Twilio REST API when credentials are configured.

use sqlx::SqlitePool;

use crate::state::SmsConfig;

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    english_message: String,
    spanish_message: String,
}

/// Loads a message template in the requested language. Spanish falls back to
/// English when the Spanish body is empty; unknown template names yield None.
pub async fn fetch_template(pool: &SqlitePool, name: &str, language: &str) -> Option<String> {
    let row = sqlx::query_as::<_, TemplateRow>(
        "SELECT english_message, spanish_message FROM sms_templates WHERE template_name = ? LIMIT 1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await
    .unwrap_or(None)?;

    if language == "es" && !row.spanish_message.trim().is_empty() {
        Some(row.spanish_message)
    } else {
        Some(row.english_message)
    }
}

/// Replaces every `{key}` occurrence with its value. Unknown placeholders are
/// left in place.
pub fn format_message(template: &str, variables: &[(&str, String)]) -> String {
    let mut message = template.to_string();
    for (key, value) in variables {
        message = message.replace(&format!("{{{key}}}"), value);
    }
    message
}

/// Normalizes US phone numbers to E.164.
pub fn format_phone(phone: &str) -> String {
    let cleaned: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if cleaned.len() == 10 {
        format!("+1{cleaned}")
    } else {
        format!("+{cleaned}")
    }
}

/// Sends one SMS. Returns Ok(false) without sending when the gateway is not
/// configured.
pub async fn send_sms(config: &SmsConfig, to: &str, body: &str) -> Result<bool, reqwest::Error> {
    if !config.enabled() {
        log::warn!("SMS gateway not configured. Message not sent.");
        return Ok(false);
    }

    let url = format!(
        "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
        config.account_sid
    );
    let params = [
        ("To", format_phone(to)),
        ("From", config.from_number.clone()),
        ("Body", body.to_string()),
    ];

    reqwest::Client::new()
        .post(&url)
        .basic_auth(&config.account_sid, Some(&config.auth_token))
        .form(&params)
        .send()
        .await?
        .error_for_status()?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_named_placeholders() {
        let rendered = format_message(
            "Payment of ${amount} was due on {date}. Zelle: {zelle}.",
            &[
                ("amount", "150.50".to_string()),
                ("date", "2026-03-01".to_string()),
                ("zelle", "pay@pool.example".to_string()),
            ],
        );
        assert_eq!(
            rendered,
            "Payment of $150.50 was due on 2026-03-01. Zelle: pay@pool.example."
        );
    }

    #[test]
    fn repeated_placeholders_all_replaced() {
        let rendered = format_message("{phone} / {phone}", &[("phone", "305-555-0000".to_string())]);
        assert_eq!(rendered, "305-555-0000 / 305-555-0000");
    }

    #[test]
    fn unknown_placeholders_left_alone() {
        let rendered = format_message("Hi {name}", &[("amount", "1".to_string())]);
        assert_eq!(rendered, "Hi {name}");
    }

    #[test]
    fn phone_normalization() {
        assert_eq!(format_phone("(305) 555-0123"), "+13055550123");
        assert_eq!(format_phone("1-305-555-0123"), "+13055550123");
        assert_eq!(format_phone("+44 20 7946 0958"), "+442079460958");
    }

    #[test]
    fn disabled_gateway_skips_send() {
        let config = SmsConfig::default();
        let sent = tokio::runtime::Runtime::new()
            .unwrap()
            .block_on(send_sms(&config, "3055550123", "hello"))
            .unwrap();
        assert!(!sent);
    }
}
