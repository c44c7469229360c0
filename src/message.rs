//! Inbound message model — parsed from raw RFC 822 bytes with `mail-parser`.

use std::collections::HashMap;

use mail_parser::MessageParser;
use serde::{Deserialize, Serialize};

/// A single unread message pulled from the mailbox.
///
/// The sender address and header names are lower-cased on construction so
/// classification and replied-cache lookups compare case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEmail {
    /// Sender address, lower-cased.
    pub sender: String,
    /// Human-readable sender name, if the From header carried one.
    pub sender_name: Option<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Protocol-assigned Message-ID, if present.
    pub message_id: Option<String>,
    /// Header name → value, names lower-cased. Only text-valued headers are
    /// kept; structured headers (From, To, Date) have dedicated fields.
    pub headers: HashMap<String, String>,
    /// Whether the mail store flagged this message unseen at fetch time.
    pub unseen: bool,
}

impl InboundEmail {
    /// Parse a raw RFC 822 message fetched from an UNSEEN search.
    ///
    /// Returns `None` when the bytes are not parseable as a message — the
    /// fetcher logs and drops such messages without aborting the batch.
    pub fn parse(raw: &[u8]) -> Option<Self> {
        let parsed = MessageParser::default().parse(raw)?;

        let (sender, sender_name) = match parsed.from().and_then(|addr| addr.first()) {
            Some(addr) => (
                addr.address.as_ref()?.to_lowercase(),
                addr.name.as_ref().map(|n| n.to_string()),
            ),
            None => return None,
        };

        let mut headers = HashMap::new();
        for header in parsed.headers() {
            if let Some(value) = header.value().as_text() {
                headers.insert(header.name().to_lowercase(), value.to_string());
            }
        }

        Some(Self {
            sender,
            sender_name,
            subject: parsed.subject().map(|s| s.to_string()),
            message_id: parsed.message_id().map(|s| s.to_string()),
            headers,
            unseen: true,
        })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}
