use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox, Message},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{SmtpConfig, TwilioConfig};
use crate::models::{VerificationChannel, CODE_TTL_MINUTES};

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Failed to build message: {0}")]
    MessageBuild(String),
    #[error("SMTP transport failed: {0}")]
    Smtp(String),
    #[error("SMS provider rejected the message: {0}")]
    SmsRejected(String),
    #[error("SMS request failed: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DeliveryError>;
}

type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

#[derive(Clone)]
pub struct SmtpEmailSender {
    mailer: SmtpTransport,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self, DeliveryError> {
        let creds = Credentials::new(config.username.clone(), config.password.clone());

        let mailer = SmtpTransport::starttls_relay(&config.host)
            .map_err(|e| DeliveryError::Smtp(e.to_string()))?
            .credentials(creds)
            .port(config.port)
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_email)
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(config.from_email.clone()))?;

        Ok(Self { mailer, from })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let to: Mailbox = to
            .parse()
            .map_err(|_| DeliveryError::InvalidAddress(to.to_string()))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to.clone())
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| DeliveryError::MessageBuild(e.to_string()))?;

        match self.mailer.send(email).await {
            Ok(_) => {
                info!("Verification email sent to {}", to);
                Ok(())
            }
            Err(e) => {
                error!("Failed to send email to {}: {}", to, e);
                Err(DeliveryError::Smtp(e.to_string()))
            }
        }
    }
}

/// Twilio Messages API client.
#[derive(Clone)]
pub struct TwilioSmsSender {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioSmsSender {
    pub fn new(config: TwilioConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl SmsSender for TwilioSmsSender {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        let params = [("To", to), ("From", self.config.from_number.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            info!("Verification SMS sent to {}", to);
            Ok(())
        } else {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!("Twilio rejected SMS to {}: {} {}", to, status, detail);
            Err(DeliveryError::SmsRejected(format!("{} {}", status, detail)))
        }
    }
}

/// Development delivery: writes the message to the log instead of sending it.
#[derive(Debug, Clone, Default)]
pub struct LogOnlySender;

#[async_trait]
impl EmailSender for LogOnlySender {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        info!(to, subject, body, "SMTP not configured, email logged instead of sent");
        Ok(())
    }
}

#[async_trait]
impl SmsSender for LogOnlySender {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), DeliveryError> {
        info!(to, body, "Twilio not configured, SMS logged instead of sent");
        Ok(())
    }
}

pub fn email_subject() -> &'static str {
    "Your Antique Body verification code"
}

pub fn code_message(code: &str) -> String {
    format!(
        "Your Antique Body verification code is {}. It expires in {} minutes. \
         If you did not request this code you can ignore this message.",
        code, CODE_TTL_MINUTES
    )
}

/// Routes verification codes to the email or SMS sender.
#[derive(Clone)]
pub struct CodeDeliveryService {
    email: Arc<dyn EmailSender>,
    sms: Arc<dyn SmsSender>,
}

impl CodeDeliveryService {
    pub fn new(email: Arc<dyn EmailSender>, sms: Arc<dyn SmsSender>) -> Self {
        Self { email, sms }
    }

    /// Uses real providers where configured and log-only delivery otherwise.
    pub fn from_config(
        smtp: Option<&SmtpConfig>,
        twilio: Option<TwilioConfig>,
    ) -> Result<Self, DeliveryError> {
        let email: Arc<dyn EmailSender> = match smtp {
            Some(config) => Arc::new(SmtpEmailSender::new(config)?),
            None => {
                tracing::warn!("SMTP_HOST not set, verification emails will only be logged");
                Arc::new(LogOnlySender)
            }
        };

        let sms: Arc<dyn SmsSender> = match twilio {
            Some(config) => Arc::new(TwilioSmsSender::new(config)),
            None => {
                tracing::warn!("Twilio credentials not set, verification SMS will only be logged");
                Arc::new(LogOnlySender)
            }
        };

        Ok(Self::new(email, sms))
    }

    pub fn log_only() -> Self {
        Self::new(Arc::new(LogOnlySender), Arc::new(LogOnlySender))
    }

    pub async fn deliver(
        &self,
        channel: VerificationChannel,
        identifier: &str,
        code: &str,
    ) -> Result<(), DeliveryError> {
        let body = code_message(code);
        match channel {
            VerificationChannel::Email => self.email.send_email(identifier, email_subject(), &body).await,
            VerificationChannel::Phone => self.sms.send_sms(identifier, &body).await,
        }
    }
}
