//! Failure notifications
//!
//! The run engine only knows the [`Notifier`] capability. Two channels ship:
//! a Discord-style webhook embed and a plain-text email over SMTP.

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::config::{EmailSettings, NotificationChannel, NotificationConfig};

/// Discord rejects embed descriptions longer than this
const MAX_DESCRIPTION_LEN: usize = 4000;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("failed to build notification client: {0}")]
    Client(String),

    #[error("failed to deliver notification: {0}")]
    Delivery(String),

    #[error("notification endpoint returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Abstraction for the notification channel, enabling mocking in tests
pub trait Notifier: Send + Sync {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Embed color codes (decimal)
#[derive(Debug, Clone, Copy)]
pub enum NotificationColor {
    /// Red - for failures
    Failure = 15158332, // #E74C3C
}

impl NotificationColor {
    fn as_decimal(&self) -> u32 {
        *self as u32
    }
}

/// Discord webhook payload
#[derive(Debug, Serialize)]
struct WebhookPayload {
    username: String,
    embeds: Vec<WebhookEmbed>,
}

#[derive(Debug, Serialize)]
struct WebhookEmbed {
    title: String,
    description: String,
    color: u32,
    footer: WebhookFooter,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct WebhookFooter {
    text: String,
}

/// Notifier posting to a Discord-compatible webhook
pub struct WebhookNotifier {
    webhook_url: String,
    client: reqwest::blocking::Client,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;

        Ok(Self {
            webhook_url: config.webhook_url.clone(),
            client,
        })
    }

    fn build_payload(&self, subject: &str, body: &str) -> WebhookPayload {
        let description = if body.chars().count() > MAX_DESCRIPTION_LEN {
            let truncated: String = body.chars().take(MAX_DESCRIPTION_LEN - 3).collect();
            format!("{}...", truncated)
        } else {
            body.trim_end().to_string()
        };

        WebhookPayload {
            username: "Ptero Backup".to_string(),
            embeds: vec![WebhookEmbed {
                title: format!("\u{274C} {}", subject),
                description,
                color: NotificationColor::Failure.as_decimal(),
                footer: WebhookFooter {
                    text: "ptero-backup".to_string(),
                },
                timestamp: chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            }],
        }
    }
}

impl Notifier for WebhookNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let payload = self.build_payload(subject, body);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Webhook notification sent successfully");
            info!("Sent failure notification: {}", subject);
            Ok(())
        } else {
            let body = response.text().unwrap_or_default();
            error!("Webhook failed with status {}: {}", status, body);
            Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }
}

/// Notifier sending a plain-text email through an SMTP relay
pub struct EmailNotifier {
    from: Mailbox,
    to: Mailbox,
    transport: SmtpTransport,
}

impl EmailNotifier {
    /// Connects with STARTTLS and logs in as `from_email` when a password is set
    pub fn new(settings: &EmailSettings) -> Result<Self, NotifyError> {
        let from = parse_mailbox("sender", &settings.from_email)?;
        let to = parse_mailbox("recipient", &settings.to_email)?;

        let mut builder = SmtpTransport::starttls_relay(settings.smtp_server.trim())
            .map_err(|e| NotifyError::Client(e.to_string()))?
            .port(settings.smtp_port)
            .timeout(Some(Duration::from_secs(30)));
        if !settings.from_password.is_empty() {
            builder = builder.credentials(Credentials::new(
                settings.from_email.trim().to_string(),
                settings.from_password.clone(),
            ));
        }

        Ok(Self {
            from,
            to,
            transport: builder.build(),
        })
    }

    fn build_message(&self, subject: &str, body: &str) -> Result<Message, NotifyError> {
        Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.trim_end().to_string())
            .map_err(|e| NotifyError::Client(e.to_string()))
    }
}

impl Notifier for EmailNotifier {
    fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
        let message = self.build_message(subject, body)?;
        let recipient = anonymize_email(&self.to.email.to_string());

        debug!("Sending failure email to {}", recipient);
        match self.transport.send(&message) {
            Ok(_) => {
                info!("Sent failure notification to {}: {}", recipient, subject);
                Ok(())
            }
            Err(e) => {
                error!("Email to {} failed: {}", recipient, e);
                Err(NotifyError::Delivery(e.to_string()))
            }
        }
    }
}

fn parse_mailbox(role: &str, address: &str) -> Result<Mailbox, NotifyError> {
    address.trim().parse::<Mailbox>().map_err(|e| {
        NotifyError::Client(format!(
            "invalid {} address {}: {}",
            role,
            anonymize_email(address),
            e
        ))
    })
}

/// Mask the local part of an address for logging: `alice@example.com` becomes `*****@example.com`
pub fn anonymize_email(address: &str) -> String {
    let address = address.trim();
    match address.split_once('@') {
        Some((local, domain)) => format!("{}@{}", "*".repeat(local.chars().count()), domain),
        None => "*".repeat(address.chars().count()),
    }
}

/// Build the configured notifier, or `None` when notifications are disabled
/// or the selected channel has no destination
pub fn from_config(config: &NotificationConfig) -> Result<Option<Box<dyn Notifier>>, NotifyError> {
    if !config.enabled {
        return Ok(None);
    }

    match config.channel {
        NotificationChannel::Webhook => {
            if config.webhook_url.trim().is_empty() {
                return Ok(None);
            }
            Ok(Some(Box::new(WebhookNotifier::new(config)?)))
        }
        NotificationChannel::Email => match config.email {
            Some(ref settings) => Ok(Some(Box::new(EmailNotifier::new(settings)?))),
            None => Ok(None),
        },
    }
}

/// Mock notifier for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct SentNotification {
        pub subject: String,
        pub body: String,
    }

    #[derive(Clone, Default)]
    pub struct RecordingNotifier {
        pub sent: Arc<Mutex<Vec<SentNotification>>>,
        should_fail: Arc<Mutex<bool>>,
    }

    impl RecordingNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure delivery to fail (the attempt is still recorded)
        pub fn with_failing_delivery(self) -> Self {
            *self.should_fail.lock().unwrap() = true;
            self
        }

        pub fn get_sent(&self) -> Vec<SentNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, subject: &str, body: &str) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(SentNotification {
                subject: subject.to_string(),
                body: body.to_string(),
            });
            if *self.should_fail.lock().unwrap() {
                return Err(NotifyError::Delivery("mock delivery failure".to_string()));
            }
            Ok(())
        }
    }
}
