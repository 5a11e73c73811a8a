//! Email notification sink using SMTP.

use crate::sink::{build_body, AlertBundle, NotificationSink};
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::{
    message::{header, Mailbox, Message, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

impl std::fmt::Debug for EmailConfig {
    /// Never writes `password` to a log line, per §6's "no secret ever
    /// enters a log line."
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

impl EmailConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            smtp_host: std::env::var("AQI_SMTP_HOST").context("AQI_SMTP_HOST not set")?,
            smtp_port: std::env::var("AQI_SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .context("invalid AQI_SMTP_PORT")?,
            username: std::env::var("AQI_SMTP_USERNAME").context("AQI_SMTP_USERNAME not set")?,
            password: std::env::var("AQI_SMTP_PASSWORD").context("AQI_SMTP_PASSWORD not set")?,
            from_address: std::env::var("AQI_SMTP_FROM_ADDRESS")
                .context("AQI_SMTP_FROM_ADDRESS not set")?,
            from_name: std::env::var("AQI_SMTP_FROM_NAME")
                .unwrap_or_else(|_| "Air Quality Alerts".to_string()),
            use_tls: std::env::var("AQI_SMTP_USE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        })
    }
}

pub struct EmailNotifier {
    config: EmailConfig,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Result<Self> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());
        let transport = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
                .port(config.smtp_port)
                .credentials(creds)
                .build()
        };
        Ok(Self { config, transport })
    }
}

#[async_trait]
impl NotificationSink for EmailNotifier {
    fn channel_name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, bundle: &AlertBundle<'_>) -> bool {
        let Some(email) = &bundle.subscriber.contact.email else {
            warn!(subscriber = %bundle.subscriber.id, "email channel enabled but no address on file");
            return false;
        };
        let from = match format!("{} <{}>", self.config.from_name, self.config.from_address).parse::<Mailbox>() {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "invalid from address");
                return false;
            }
        };
        let to = match email.parse::<Mailbox>() {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "invalid recipient address");
                return false;
            }
        };
        let body = build_body(bundle);
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(format!("{} air-quality alert(s)", bundle.alerts.len()))
            .multipart(MultiPart::alternative().singlepart(
                SinglePart::builder().header(header::ContentType::TEXT_PLAIN).body(body),
            ));
        let message = match message {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "failed to build email");
                return false;
            }
        };
        match self.transport.send(message).await {
            Ok(_) => {
                info!(subscriber = %bundle.subscriber.id, "alert email sent");
                true
            }
            Err(e) => {
                error!(subscriber = %bundle.subscriber.id, error = %e, "failed to send alert email");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp.example.invalid".to_string(),
            smtp_port: 587,
            username: "alerts".to_string(),
            password: "super-secret".to_string(),
            from_address: "alerts@example.invalid".to_string(),
            from_name: "Air Quality Alerts".to_string(),
            use_tls: true,
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
