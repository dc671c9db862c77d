//! Outbound email through a Resend-style HTTP gateway. Same optional contract
//! as the SMS side: no API key means sending is silently skipped.

use serde_json::json;

use crate::state::MailConfig;

/// Sends one email. Returns Ok(false) without sending when the gateway is not
/// configured.
pub async fn send_email(
    config: &MailConfig,
    to: &str,
    subject: &str,
    html: &str,
) -> Result<bool, reqwest::Error> {
    if !config.enabled() {
        log::warn!("Mail gateway not configured. Email not sent.");
        return Ok(false);
    }

    let payload = json!({
        "from": config.from,
        "to": to,
        "subject": subject,
        "html": html,
    });

    reqwest::Client::new()
        .post("https://api.resend.com/emails")
        .bearer_auth(&config.api_key)
        .json(&payload)
        .send()
        .await?
        .error_for_status()?;

    Ok(true)
}
