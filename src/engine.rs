//! Reply decision engine — an ordered skip-rule table, first match wins.
//!
//! The precedence lives in one place (`SKIP_RULES`) so it stays auditable
//! and testable without any network layer involved.

use serde::{Deserialize, Serialize};

use crate::cache::RepliedCache;
use crate::classify;
use crate::message::InboundEmail;

/// Classification outcome for one message. Exactly one per decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Sender already received a reply since the last cache clear.
    SkipAlreadyReplied,
    /// Sender address is a one-way notification address.
    SkipNoReply,
    /// Message is itself an automated response.
    SkipAutoReply,
    /// Message came from the account's own address.
    SkipSelf,
    /// Message qualifies for an auto-reply.
    Reply,
}

impl Outcome {
    /// Short label for log fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::SkipAlreadyReplied => "already_replied",
            Self::SkipNoReply => "no_reply_sender",
            Self::SkipAutoReply => "auto_reply",
            Self::SkipSelf => "self",
            Self::Reply => "reply",
        }
    }

    pub fn is_reply(&self) -> bool {
        matches!(self, Self::Reply)
    }
}

/// A skip predicate: message, replied cache, own address → should skip.
type SkipCheck = fn(&InboundEmail, &RepliedCache, &str) -> bool;

fn already_replied(message: &InboundEmail, replied: &RepliedCache, _self_address: &str) -> bool {
    replied.contains(&message.sender)
}

fn no_reply_sender(message: &InboundEmail, _replied: &RepliedCache, _self_address: &str) -> bool {
    classify::is_no_reply(&message.sender)
}

fn automated_response(message: &InboundEmail, _replied: &RepliedCache, _self_address: &str) -> bool {
    classify::is_auto_reply(message)
}

fn own_address(message: &InboundEmail, _replied: &RepliedCache, self_address: &str) -> bool {
    message.sender == self_address
}

/// Skip rules in precedence order. The first matching rule decides.
const SKIP_RULES: [(Outcome, SkipCheck); 4] = [
    (Outcome::SkipAlreadyReplied, already_replied),
    (Outcome::SkipNoReply, no_reply_sender),
    (Outcome::SkipAutoReply, automated_response),
    (Outcome::SkipSelf, own_address),
];

/// Decide whether `message` gets an auto-reply.
///
/// Pure — recording a reply in the cache is the caller's job, and only
/// after the send is confirmed. Both `message.sender` and `self_address`
/// are expected lower-cased (the message and config constructors normalize).
pub fn decide(message: &InboundEmail, replied: &RepliedCache, self_address: &str) -> Outcome {
    SKIP_RULES
        .iter()
        .find(|(_, applies)| applies(message, replied, self_address))
        .map_or(Outcome::Reply, |(outcome, _)| *outcome)
}
