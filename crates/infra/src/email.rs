//! Outbound email boundary. Delivery is fire-and-forget: the auth flows never
//! wait on or fail because of a send.

use std::sync::Mutex;

use clinic_auth::Identity;

#[async_trait::async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_reset_password_email(&self, to: &Identity, token: &str);

    async fn send_verification_email(&self, to: &Identity, token: &str);
}

/// Development sender: logs the fact that an email would go out.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingEmailSender;

#[async_trait::async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send_reset_password_email(&self, to: &Identity, _token: &str) {
        tracing::info!(user_id = %to.id, kind = "reset-password", "email queued");
    }

    async fn send_verification_email(&self, to: &Identity, _token: &str) {
        tracing::info!(user_id = %to.id, kind = "verify-email", "email queued");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentEmail {
    pub to: String,
    pub kind: &'static str,
    pub token: String,
}

/// Keeps every message in memory so tests can pick up the tokens.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Token of the most recent message of `kind` sent to `to`.
    pub fn last_token(&self, to: &str, kind: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.to == to && m.kind == kind)
            .map(|m| m.token)
    }

    fn record(&self, to: &Identity, kind: &'static str, token: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentEmail {
                to: to.email.clone(),
                kind,
                token: token.to_string(),
            });
        }
    }
}

#[async_trait::async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send_reset_password_email(&self, to: &Identity, token: &str) {
        self.record(to, "reset-password", token);
    }

    async fn send_verification_email(&self, to: &Identity, token: &str) {
        self.record(to, "verify-email", token);
    }
}
