//! IMAP mail fetcher — pulls the current batch of unseen messages.
//!
//! Raw IMAP over rustls, no protocol crate. The blocking session runs under
//! `spawn_blocking`, and a socket read timeout bounds how long a hanging
//! server can stall one poll cycle.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FetchError;
use crate::message::InboundEmail;

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Fetches the messages currently flagged unseen in the mailbox.
#[async_trait]
pub trait MailFetcher: Send + Sync {
    async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, FetchError>;
}

/// IMAP-over-TLS fetcher. Each fetch opens a fresh authenticated session,
/// pulls every unseen message, marks it seen, and logs out.
#[derive(Clone)]
pub struct ImapFetcher {
    host: String,
    port: u16,
    username: String,
    password: String,
    mailbox: String,
}

impl ImapFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            host: config.imap_host.clone(),
            port: config.imap_port,
            username: config.address.clone(),
            password: config.password.clone(),
            mailbox: config.mailbox.clone(),
        }
    }

    fn fetch_blocking(&self) -> Result<Vec<InboundEmail>, FetchError> {
        let mut session = ImapSession::connect(&self.host, self.port)?;
        session.login(&self.username, &self.password)?;
        session.select(&self.mailbox)?;

        let sequence = session.search_unseen()?;
        let mut messages = Vec::with_capacity(sequence.len());

        for seq in sequence {
            // One bad message never aborts the batch.
            match session.fetch_rfc822(seq) {
                Ok(raw) => match InboundEmail::parse(&raw) {
                    Some(email) => messages.push(email),
                    None => warn!(seq, "Unparseable message, skipping"),
                },
                Err(e) => {
                    warn!(seq, error = %e, "Failed to fetch message, continuing with batch");
                }
            }
            session.mark_seen(seq);
        }

        session.logout();
        Ok(messages)
    }
}

#[async_trait]
impl MailFetcher for ImapFetcher {
    async fn fetch_unseen(&self) -> Result<Vec<InboundEmail>, FetchError> {
        let fetcher = self.clone();
        tokio::task::spawn_blocking(move || fetcher.fetch_blocking())
            .await
            .map_err(|e| FetchError::Protocol(format!("fetch task aborted: {e}")))?
    }
}

// ── IMAP session ────────────────────────────────────────────────────

type TlsStream = rustls::StreamOwned<rustls::ClientConnection, TcpStream>;

/// One authenticated IMAP session. Commands are tagged A1, A2, ... and each
/// response is read through its tagged completion line.
struct ImapSession {
    stream: TlsStream,
    tag_seq: u32,
}

impl ImapSession {
    fn connect(host: &str, port: u16) -> Result<Self, FetchError> {
        let tcp = TcpStream::connect((host, port))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let server_name = rustls_pki_types::ServerName::try_from(host.to_string())?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)?;

        let mut session = Self {
            stream: rustls::StreamOwned::new(conn, tcp),
            tag_seq: 0,
        };

        let greeting = session.read_line()?;
        if !greeting.starts_with("* OK") {
            return Err(FetchError::Protocol(format!(
                "unexpected greeting: {}",
                greeting.trim_end()
            )));
        }
        Ok(session)
    }

    fn login(&mut self, username: &str, password: &str) -> Result<(), FetchError> {
        match self.command(&format!("LOGIN \"{username}\" \"{password}\"")) {
            Ok(_) => Ok(()),
            Err(FetchError::Protocol(_)) => Err(FetchError::Auth {
                username: username.to_string(),
            }),
            Err(e) => Err(e),
        }
    }

    fn select(&mut self, mailbox: &str) -> Result<(), FetchError> {
        self.command(&format!("SELECT \"{mailbox}\"")).map(|_| ())
    }

    fn search_unseen(&mut self) -> Result<Vec<u32>, FetchError> {
        let lines = self.command("SEARCH UNSEEN")?;
        Ok(parse_search_response(&lines))
    }

    /// Fetch the full RFC 822 body of one message. The untagged response
    /// line carries an octet count (`* 7 FETCH (RFC822 {1234}`) followed by
    /// exactly that many literal bytes.
    fn fetch_rfc822(&mut self, seq: u32) -> Result<Vec<u8>, FetchError> {
        let tag = self.next_tag();
        self.send(&tag, &format!("FETCH {seq} RFC822"))?;

        let mut raw: Option<Vec<u8>> = None;
        loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix(&format!("{tag} ")) {
                if !rest.starts_with("OK") {
                    return Err(FetchError::Protocol(format!(
                        "fetch rejected: {}",
                        line.trim_end()
                    )));
                }
                break;
            }
            if raw.is_none()
                && let Some(size) = parse_literal_size(&line)
            {
                let mut buf = vec![0u8; size];
                self.stream.read_exact(&mut buf)?;
                raw = Some(buf);
            }
        }

        raw.ok_or_else(|| FetchError::Protocol(format!("no message literal in FETCH {seq} response")))
    }

    /// Best-effort; the store owns seen semantics and a failed flag update
    /// only means the message may be fetched again next cycle.
    fn mark_seen(&mut self, seq: u32) {
        if let Err(e) = self.command(&format!("STORE {seq} +FLAGS (\\Seen)")) {
            debug!(seq, error = %e, "Failed to mark message seen");
        }
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }

    /// Send a command and collect response lines through the tagged
    /// completion line. Errors unless the server answers `<tag> OK`. The
    /// error carries only the server's line, never the command text.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, FetchError> {
        let tag = self.next_tag();
        self.send(&tag, cmd)?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if let Some(rest) = line.strip_prefix(&format!("{tag} ")) {
                if !rest.starts_with("OK") {
                    return Err(FetchError::Protocol(format!(
                        "command rejected: {}",
                        line.trim_end()
                    )));
                }
                lines.push(line);
                return Ok(lines);
            }
            lines.push(line);
        }
    }

    fn send(&mut self, tag: &str, cmd: &str) -> Result<(), FetchError> {
        self.stream.write_all(format!("{tag} {cmd}\r\n").as_bytes())?;
        self.stream.flush()?;
        Ok(())
    }

    fn next_tag(&mut self) -> String {
        self.tag_seq += 1;
        format!("A{}", self.tag_seq)
    }

    fn read_line(&mut self) -> Result<String, FetchError> {
        let mut buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            match self.stream.read(&mut byte) {
                Ok(0) => {
                    return Err(FetchError::Protocol(
                        "connection closed mid-response".into(),
                    ));
                }
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).into_owned());
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

// ── Response parsing ────────────────────────────────────────────────

/// Collect message sequence numbers from `* SEARCH 1 2 3` lines.
fn parse_search_response(lines: &[String]) -> Vec<u32> {
    lines
        .iter()
        .filter(|l| l.starts_with("* SEARCH"))
        .flat_map(|l| l.split_whitespace().skip(2))
        .filter_map(|tok| tok.parse().ok())
        .collect()
}

/// Parse the octet count from a response line ending in `{<n>}`.
fn parse_literal_size(line: &str) -> Option<usize> {
    let trimmed = line.trim_end();
    let open = trimmed.rfind('{')?;
    if !trimmed.ends_with('}') {
        return None;
    }
    trimmed[open + 1..trimmed.len() - 1].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_response_with_hits() {
        let lines = vec![
            "* SEARCH 3 7 12\r\n".to_string(),
            "A3 OK SEARCH completed\r\n".to_string(),
        ];
        assert_eq!(parse_search_response(&lines), vec![3, 7, 12]);
    }

    #[test]
    fn search_response_empty() {
        let lines = vec![
            "* SEARCH\r\n".to_string(),
            "A3 OK SEARCH completed\r\n".to_string(),
        ];
        assert!(parse_search_response(&lines).is_empty());
    }

    #[test]
    fn search_response_ignores_other_untagged_lines() {
        let lines = vec![
            "* 14 EXISTS\r\n".to_string(),
            "* SEARCH 5\r\n".to_string(),
            "A3 OK SEARCH completed\r\n".to_string(),
        ];
        assert_eq!(parse_search_response(&lines), vec![5]);
    }

    #[test]
    fn literal_size_parsed() {
        assert_eq!(parse_literal_size("* 7 FETCH (RFC822 {1234}\r\n"), Some(1234));
    }

    #[test]
    fn literal_size_absent() {
        assert_eq!(parse_literal_size("* 7 FETCH (FLAGS (\\Seen))\r\n"), None);
        assert_eq!(parse_literal_size("A4 OK FETCH completed\r\n"), None);
    }

    #[test]
    fn literal_size_not_trailing() {
        assert_eq!(parse_literal_size("* 7 FETCH ({12} trailing)\r\n"), None);
    }
}
