//! Keyword classifiers — no-reply senders and automated responses.
//!
//! Both checks are case-insensitive substring matches over fixed keyword
//! sets, not token matches: an address or subject containing a keyword
//! anywhere qualifies.

use crate::message::InboundEmail;

/// Substrings that mark a one-way notification address, in either the
/// local part or the domain.
const NO_REPLY_KEYWORDS: [&str; 8] = [
    "no-reply",
    "noreply",
    "donotreply",
    "do-not-reply",
    "automated",
    "notification",
    "alerts",
    "system",
];

/// Subject substrings that mark an automated response. The bare "reply"
/// keyword also matches ordinary subjects like "Re: reply to my last email";
/// the over-match is kept from the original behavior.
const AUTO_REPLY_SUBJECTS: [&str; 7] = [
    "auto",
    "automatic",
    "reply",
    "vacation",
    "out of office",
    "ooo",
    "away",
];

/// Headers that auto-responders set on their outgoing mail.
const AUTO_REPLY_HEADERS: [&str; 4] = [
    "Auto-Submitted",
    "X-Auto-Response-Suppress",
    "X-Autoreply",
    "X-Autorespond",
];

/// Whether `address` is a one-way notification address that should never
/// receive a reply.
pub fn is_no_reply(address: &str) -> bool {
    let address = address.to_lowercase();
    NO_REPLY_KEYWORDS.iter().any(|kw| address.contains(kw))
}

/// Whether `message` is itself an automated response, by subject keyword or
/// by auto-responder header with a non-empty value. A missing subject or
/// header set simply fails that branch.
pub fn is_auto_reply(message: &InboundEmail) -> bool {
    if let Some(subject) = message.subject.as_deref() {
        let subject = subject.to_lowercase();
        if AUTO_REPLY_SUBJECTS.iter().any(|kw| subject.contains(kw)) {
            return true;
        }
    }

    AUTO_REPLY_HEADERS
        .iter()
        .any(|name| message.header(name).is_some_and(|v| !v.is_empty()))
}
