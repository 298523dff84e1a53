use std::time::Duration;

use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

use crate::auth::otp::mask_email;
use crate::config::EmailConfig;

pub mod templates;

pub use templates::{render_otp_mail, OtpMailKind, RenderedMail};

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("failed to build email message: {0}")]
    MessageBuild(String),
    #[error("failed to send email: {0}")]
    SendFailed(String),
    #[error("mail transport configuration error: {0}")]
    Config(String),
    #[error("timed out sending email")]
    Timeout,
}

/// Outbound mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, mail: RenderedMail) -> Result<(), MailError>;
}

/// Sends through `mailer` but gives up after `limit`.
pub async fn send_with_timeout(
    mailer: &dyn Mailer,
    limit: Duration,
    to: &str,
    mail: RenderedMail,
) -> Result<(), MailError> {
    match tokio::time::timeout(limit, mailer.send(to, mail)).await {
        Ok(res) => res,
        Err(_) => Err(MailError::Timeout),
    }
}

/// Development transport: writes the message to the log instead of sending it.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, mail: RenderedMail) -> Result<(), MailError> {
        info!(to = %mask_email(to), subject = %mail.subject, "mail transport not configured; message logged only");
        debug!(body = %mail.text, "mail body");
        Ok(())
    }
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn from_config(cfg: &EmailConfig) -> Result<Self, MailError> {
        let smtp = cfg
            .smtp
            .as_ref()
            .ok_or_else(|| MailError::Config("SMTP_HOST not set".into()))?;

        let from = format!("{} <{}>", cfg.from_name, cfg.from_address)
            .parse::<Mailbox>()
            .map_err(|e| MailError::Config(format!("invalid EMAIL_FROM: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| MailError::Config(format!("smtp relay error: {e}")))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .timeout(Some(cfg.send_timeout()))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, to: &str, mail: RenderedMail) -> Result<(), MailError> {
        let to_box = to
            .parse::<Mailbox>()
            .map_err(|e| MailError::MessageBuild(format!("invalid recipient: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to_box)
            .subject(mail.subject)
            .multipart(MultiPart::alternative_plain_html(mail.text, mail.html))
            .map_err(|e| MailError::MessageBuild(e.to_string()))?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| MailError::SendFailed(e.to_string()))?;

        debug!(to = %mask_email(to), code = ?response.code(), "mail accepted by relay");
        Ok(())
    }
}

/// SMTP when configured, otherwise the logging transport.
pub fn from_config(cfg: &EmailConfig) -> Result<std::sync::Arc<dyn Mailer>, MailError> {
    Ok(match cfg.smtp {
        Some(_) => std::sync::Arc::new(SmtpMailer::from_config(cfg)?),
        None => std::sync::Arc::new(LogMailer),
    })
}
