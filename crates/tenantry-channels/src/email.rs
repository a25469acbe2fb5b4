//! Email delivery over SMTP (STARTTLS) using lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::{Deserialize, Serialize};
use tenantry_core::error::{Result, TenantryError};
use tenantry_core::{Message, MessageChannel, MessengerType};

use crate::client::MessengerClient;

/// SMTP relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// `From` address, e.g. `Tenantry <noreply@example.com>`.
    pub sender_address: String,
}

fn default_smtp_port() -> u16 { 587 }

pub struct SmtpEmailClient {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender: Mailbox,
}

impl SmtpEmailClient {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let sender: Mailbox = config
            .sender_address
            .parse()
            .map_err(|e| TenantryError::config(format!("invalid sender address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| TenantryError::config(format!("SMTP relay {}: {e}", config.host)))?
            .port(config.port);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            sender,
        })
    }

    fn build_email(&self, message: &Message) -> Result<lettre::Message> {
        message.validate_for(MessageChannel::Email)?;
        let to: Mailbox = message
            .to_email
            .as_deref()
            .unwrap_or_default()
            .parse()
            .map_err(|e| TenantryError::validation(format!("invalid recipient address: {e}")))?;

        lettre::Message::builder()
            .from(self.sender.clone())
            .to(to)
            .subject(message.title.clone())
            .header(ContentType::TEXT_HTML)
            .body(message.body.clone())
            .map_err(|e| TenantryError::delivery(MessageChannel::Email, format!("build email: {e}")))
    }
}

#[async_trait]
impl MessengerClient for SmtpEmailClient {
    fn messenger_type(&self) -> MessengerType { MessengerType::Smtp }

    async fn send_message(&self, message: &Message) -> Result<()> {
        let email = self.build_email(message)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| TenantryError::delivery(MessageChannel::Email, e.to_string()))?;
        tracing::debug!(title = %message.title, "email sent via SMTP");
        Ok(())
    }
}
