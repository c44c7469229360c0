//! SMTP reply sender — one best-effort send per qualifying message.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};

use crate::config::Config;
use crate::error::SendError;

/// Sends the templated auto-reply to one recipient.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn send_reply(&self, to: &str) -> Result<(), SendError>;
}

/// Lettre-backed sender over implicit TLS (the SMTPS port, 465 by default).
/// Subject and body come from configuration; one attempt, no retry.
pub struct SmtpSender {
    host: String,
    port: u16,
    from: Mailbox,
    username: String,
    password: String,
    subject: String,
    body: String,
}

impl SmtpSender {
    pub fn new(config: &Config) -> Result<Self, SendError> {
        Ok(Self {
            host: config.smtp_host.clone(),
            port: config.smtp_port,
            from: config.address.parse()?,
            username: config.address.clone(),
            password: config.password.clone(),
            subject: config.reply_subject.clone(),
            body: config.reply_body.clone(),
        })
    }

    fn send_blocking(&self, to: &str) -> Result<(), SendError> {
        let transport = SmtpTransport::relay(&self.host)?
            .port(self.port)
            .credentials(Credentials::new(
                self.username.clone(),
                self.password.clone(),
            ))
            .build();

        let reply = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(self.subject.clone())
            .body(self.body.clone())?;

        transport.send(&reply)?;
        Ok(())
    }
}

#[async_trait]
impl ReplySender for SmtpSender {
    async fn send_reply(&self, to: &str) -> Result<(), SendError> {
        self.send_blocking(to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> Config {
        Config {
            imap_host: "imap.test.com".into(),
            imap_port: 993,
            smtp_host: "smtp.test.com".into(),
            smtp_port: 465,
            address: "me@test.com".into(),
            password: "secret".into(),
            mailbox: "INBOX".into(),
            poll_interval: Duration::from_secs(5),
            reply_subject: "Auto-Reply".into(),
            reply_body: "I am away.\n".into(),
            log_dir: ".".into(),
        }
    }

    #[test]
    fn sender_builds_from_config() {
        let sender = SmtpSender::new(&config()).unwrap();
        assert_eq!(sender.subject, "Auto-Reply");
        assert_eq!(sender.from.email.to_string(), "me@test.com");
    }

    #[test]
    fn invalid_from_address_is_rejected() {
        let mut cfg = config();
        cfg.address = "not-an-address".into();
        assert!(matches!(
            SmtpSender::new(&cfg),
            Err(SendError::Address(_))
        ));
    }
}
