//! Service configuration, built from `AUTOREPLY_*` environment variables.

use std::time::Duration;

use crate::error::ConfigError;

/// Reply body when `AUTOREPLY_BODY` is unset.
const DEFAULT_BODY: &str = "Thank you for your email. I am currently away and \
will respond to your message when I return.\n\nBest Regards,\n";

/// Static service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub imap_host: String,
    pub imap_port: u16,
    pub smtp_host: String,
    pub smtp_port: u16,
    /// Account address — login username, the From of every reply, and the
    /// self-address the decision engine skips. Lower-cased.
    pub address: String,
    pub password: String,
    /// Mailbox to poll for unseen messages.
    pub mailbox: String,
    pub poll_interval: Duration,
    pub reply_subject: String,
    pub reply_body: String,
    /// Directory for the persistent log file.
    pub log_dir: String,
}

impl Config {
    /// Build config from environment variables.
    ///
    /// `AUTOREPLY_IMAP_HOST`, `AUTOREPLY_ADDRESS`, and `AUTOREPLY_PASSWORD`
    /// are required; everything else has a default. The SMTP host falls back
    /// to the IMAP host with `imap` swapped for `smtp`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let imap_host = require("AUTOREPLY_IMAP_HOST")?;
        let smtp_host = std::env::var("AUTOREPLY_SMTP_HOST")
            .unwrap_or_else(|_| derive_smtp_host(&imap_host));

        Ok(Self {
            imap_port: parse_or("AUTOREPLY_IMAP_PORT", 993)?,
            smtp_port: parse_or("AUTOREPLY_SMTP_PORT", 465)?,
            address: require("AUTOREPLY_ADDRESS")?.to_lowercase(),
            password: require("AUTOREPLY_PASSWORD")?,
            mailbox: var_or("AUTOREPLY_MAILBOX", "INBOX"),
            poll_interval: Duration::from_secs(parse_or("AUTOREPLY_POLL_INTERVAL_SECS", 5)?),
            reply_subject: var_or("AUTOREPLY_SUBJECT", "Auto-Reply"),
            reply_body: var_or("AUTOREPLY_BODY", DEFAULT_BODY),
            log_dir: var_or("AUTOREPLY_LOG_DIR", "."),
            imap_host,
            smtp_host,
        })
    }
}

/// `imap.gmail.com` → `smtp.gmail.com`; hosts without an `imap` label are
/// returned unchanged.
fn derive_smtp_host(imap_host: &str) -> String {
    imap_host.replace("imap", "smtp")
}

fn require(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
