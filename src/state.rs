use sqlx::SqlitePool;

use crate::backup::BackupManager;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub sms: SmsConfig,
    pub mail: MailConfig,
    pub backup: BackupManager,
    pub cron_secret: String,
}

/// Twilio-style SMS gateway credentials. Sending is silently disabled when
/// the account is not configured.
#[derive(Clone, Debug, Default)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

impl SmsConfig {
    pub fn from_env() -> Self {
        Self {
            account_sid: std::env::var("TWILIO_ACCOUNT_SID").unwrap_or_default(),
            auth_token: std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default(),
            from_number: std::env::var("TWILIO_PHONE_NUMBER").unwrap_or_default(),
        }
    }

    pub fn enabled(&self) -> bool {
        !(self.account_sid.trim().is_empty()
            || self.auth_token.trim().is_empty()
            || self.from_number.trim().is_empty())
    }
}

/// Mail gateway credentials, same optional contract as [`SmsConfig`].
#[derive(Clone, Debug, Default)]
pub struct MailConfig {
    pub api_key: String,
    pub from: String,
}

impl MailConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("RESEND_API_KEY").unwrap_or_default(),
            from: std::env::var("MAIL_FROM")
                .unwrap_or_else(|_| "Pooltrack <noreply@example.com>".to_string()),
        }
    }

    pub fn enabled(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
