//! # HoundHub Notify
//!
//! The notification dispatcher seam. The engine renders an [`OutboundEmail`]
//! and hands it to a [`Mailer`]; transport details (SMTP host, credentials,
//! TLS) never leak into workflow code.
//!
//! Three implementations:
//! - [`smtp::SmtpMailer`] — production sending via lettre
//! - [`LogMailer`] — dry-run mode when SMTP is disabled in config
//! - [`MemoryMailer`] — test double that records sends

pub mod smtp;

use async_trait::async_trait;
use std::sync::Mutex;

/// A fully rendered email ready to dispatch.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub to: String,
    pub to_name: Option<String>,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// The dispatcher's verdict on one send. Failures are data, not panics —
/// the caller decides what a failed send means for its own state.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub message: String,
}

impl SendOutcome {
    pub fn sent() -> Self {
        Self {
            success: true,
            message: "sent".into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Anything that can deliver an email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutboundEmail) -> SendOutcome;
}

/// Logs outbound mail instead of sending it. Used when SMTP is disabled.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutboundEmail) -> SendOutcome {
        tracing::info!(
            "Outbound email (smtp disabled): to={} subject={:?}",
            mail.to,
            mail.subject
        );
        SendOutcome {
            success: true,
            message: "smtp disabled; logged only".into(),
        }
    }
}

/// Records every send in memory. Tests can script the next failure.
#[derive(Default)]
pub struct MemoryMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    fail_with: Mutex<Option<String>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent send fails with the given message until cleared.
    pub fn fail_with(&self, message: &str) {
        *self.fail_with.lock().unwrap() = Some(message.to_string());
    }

    pub fn clear_failure(&self) {
        *self.fail_with.lock().unwrap() = None;
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, mail: &OutboundEmail) -> SendOutcome {
        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return SendOutcome::failed(message);
        }
        self.sent.lock().unwrap().push(mail.clone());
        SendOutcome::sent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail() -> OutboundEmail {
        OutboundEmail {
            to: "ada@example.com".into(),
            to_name: Some("Ada".into()),
            subject: "hello".into(),
            html_body: "<p>hi</p>".into(),
            text_body: "hi".into(),
        }
    }

    #[tokio::test]
    async fn test_memory_mailer_records() {
        let mailer = MemoryMailer::new();
        let outcome = mailer.send(&mail()).await;
        assert!(outcome.success);
        assert_eq!(mailer.sent_count(), 1);
        assert_eq!(mailer.sent()[0].to, "ada@example.com");
    }

    #[tokio::test]
    async fn test_memory_mailer_scripted_failure() {
        let mailer = MemoryMailer::new();
        mailer.fail_with("relay down");
        let outcome = mailer.send(&mail()).await;
        assert!(!outcome.success);
        assert_eq!(outcome.message, "relay down");
        assert_eq!(mailer.sent_count(), 0);

        mailer.clear_failure();
        assert!(mailer.send(&mail()).await.success);
    }
}
