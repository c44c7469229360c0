//! Error types for the auto-reply service.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mail fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Reply send error: {0}")]
    Send(#[from] SendError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// IMAP fetch errors. A failed fetch abandons the current poll cycle; the
/// driver retries on the next interval.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    #[error("Invalid server name: {0}")]
    InvalidHost(#[from] rustls_pki_types::InvalidDnsNameError),

    #[error("IMAP login rejected for {username}")]
    Auth { username: String },

    #[error("Unexpected IMAP response: {0}")]
    Protocol(String),
}

/// SMTP send errors. A failed send abandons only that message's reply.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build reply message: {0}")]
    Message(#[from] lettre::error::Error),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
