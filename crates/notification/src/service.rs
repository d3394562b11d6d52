//! Email notification service using lettre

use async_trait::async_trait;
use formgate_intake::{Notification, NotificationSender};
use formgate_shared::dispatch::DeliveryError;
use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, header},
    transport::smtp::authentication::Credentials,
};
use serde::Deserialize;

use crate::template;

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_address: String,
    pub contact_address: String,
}

/// Sends submission notifications to the site's contact inbox.
#[derive(Clone)]
pub struct EmailService {
    mailer: SmtpTransport,
    from: String,
    contact_address: String,
}

impl EmailService {
    /// Create a new email service from configuration
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let mailer = if config.smtp_username.is_empty() || config.smtp_password.is_empty() {
            tracing::info!(
                smtp_host = %config.smtp_host,
                smtp_port = config.smtp_port,
                "SMTP credentials not configured, using unauthenticated connection (e.g., MailDev)"
            );
            SmtpTransport::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .build()
        } else {
            tracing::info!(
                smtp_host = %config.smtp_host,
                smtp_port = config.smtp_port,
                from = %config.from_address,
                "Email service initialized with authentication and TLS"
            );

            let creds =
                Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

            SmtpTransport::relay(&config.smtp_host)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };

        Ok(Self {
            mailer,
            from: config.from_address.clone(),
            contact_address: config.contact_address.clone(),
        })
    }

    pub async fn send_plain(
        &self,
        to: &str,
        reply_to: Option<&str>,
        subject: impl Into<String>,
        plain: impl Into<String>,
    ) -> Result<(), DeliveryError> {
        let subject = subject.into();

        tracing::info!(to = %to, subject = %subject, "Sending email text plain");

        let mut builder = Message::builder()
            .from(parse_mailbox(&self.from)?)
            .to(parse_mailbox(to)?)
            .subject(subject)
            .header(header::ContentType::TEXT_PLAIN);

        // A malformed sender address only costs the reply-to header.
        if let Some(reply_to) = reply_to.and_then(|address| address.parse::<Mailbox>().ok()) {
            builder = builder.reply_to(reply_to);
        }

        let message = builder
            .body(plain.into())
            .map_err(DeliveryError::permanent)?;

        let mailer = self.mailer.clone();
        tokio::task::spawn_blocking(move || mailer.send(&message))
            .await
            .map_err(DeliveryError::transient)?
            .map_err(|err| {
                if err.is_permanent() {
                    DeliveryError::permanent(err)
                } else {
                    DeliveryError::transient(err)
                }
            })?;

        Ok(())
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, DeliveryError> {
    address.parse().map_err(DeliveryError::permanent)
}

#[async_trait]
impl NotificationSender for EmailService {
    async fn send(&self, message: &Notification) -> Result<(), DeliveryError> {
        let email = template::render(message).map_err(DeliveryError::permanent)?;

        self.send_plain(
            &self.contact_address,
            message.submission.sender_email(),
            email.subject,
            email.body,
        )
        .await
    }
}
