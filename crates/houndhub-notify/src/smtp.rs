//! SMTP delivery via lettre's async transport.

use async_trait::async_trait;
use houndhub_core::config::SmtpConfig;
use houndhub_core::{HoundHubError, Result};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::{Mailer, OutboundEmail, SendOutcome};

/// Production mailer: STARTTLS relay with credentials from config.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| HoundHubError::Mail(format!("Invalid from address: {e}")))?;

        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| HoundHubError::Mail(format!("SMTP relay: {e}")))?
            .port(config.port)
            .credentials(creds)
            // A hanging relay must not stall the whole tick.
            .timeout(Some(Duration::from_secs(config.send_timeout_secs)))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutboundEmail) -> SendOutcome {
        let address = match mail.to.parse::<lettre::Address>() {
            Ok(addr) => addr,
            Err(e) => return SendOutcome::failed(format!("Invalid recipient: {e}")),
        };
        let to = Mailbox::new(mail.to_name.clone(), address);

        let message = match Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                mail.text_body.clone(),
                mail.html_body.clone(),
            )) {
            Ok(m) => m,
            Err(e) => return SendOutcome::failed(format!("Build email: {e}")),
        };

        match self.transport.send(message).await {
            Ok(_) => {
                tracing::info!("Email sent to {}", mail.to);
                SendOutcome::sent()
            }
            Err(e) => SendOutcome::failed(format!("SMTP send: {e}")),
        }
    }
}
