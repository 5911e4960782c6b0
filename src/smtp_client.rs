use anyhow::{Result, Context};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{info, debug};

use crate::config::SmtpConfig;
use crate::digest::Digest;

/// Delivers the assembled digest to the learner's mailbox over SMTP.
pub struct DigestSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    sender_name: String,
    username: String,
    recipient: String,
}

impl DigestSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        info!("Initializing SMTP transport for {}:{}", config.server, config.port);

        let creds = Credentials::new(config.username.clone(), config.password.clone());

        // STARTTLS relay, the standard Gmail submission setup
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
            .context("Unable to create SMTP transport")?
            .port(config.port)
            .credentials(creds)
            .build();

        Ok(DigestSender {
            mailer,
            sender_name: config.sender_name.clone(),
            username: config.username.clone(),
            recipient: config.recipient.clone(),
        })
    }

    /// Send one digest. A failure here means the caller must not mark any
    /// source message processed.
    pub async fn send_digest(&self, digest: &Digest) -> Result<()> {
        let subject = format!(
            "{} — {}",
            digest.title,
            chrono::Utc::now().format("%Y-%m-%d")
        );
        debug!("Building digest email: {}", subject);

        let from: Mailbox = format!("{} <{}>", self.sender_name, self.username)
            .parse()
            .context("Invalid sender address")?;

        let to: Mailbox = self.recipient
            .parse()
            .context("Invalid recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(digest.body.clone())
            .context("Unable to build digest email")?;

        self.mailer
            .send(email)
            .await
            .context("Unable to send digest email via SMTP")?;

        info!("✅ Digest sent to {}: {}", self.recipient, subject);
        Ok(())
    }
}
