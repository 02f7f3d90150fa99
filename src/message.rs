//! Inbound message types and the normalized document derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who sent the message, as reported by the mailbox collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sender {
    /// Display name from the `From:` header, if present.
    pub name: Option<String>,
    /// Email address, e.g. `alice@example.com`.
    pub address: String,
}

/// A raw inbound email as handed over by the mailbox reader.
///
/// Immutable once it enters the pipeline. The `id` is the mailbox-native
/// message identifier and keys single-flight execution and the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub subject: String,
    pub body_text: String,
    /// HTML body, used only when `body_text` is empty or whitespace.
    pub body_html: Option<String>,
    pub sender: Sender,
    pub received_at: DateTime<Utc>,
}

impl RawMessage {
    /// Convenience constructor for plain-text messages.
    pub fn plain(id: &str, subject: &str, body: &str, sender_address: &str) -> Self {
        Self {
            id: id.to_string(),
            subject: subject.to_string(),
            body_text: body.to_string(),
            body_html: None,
            sender: Sender {
                name: None,
                address: sender_address.to_string(),
            },
            received_at: Utc::now(),
        }
    }
}

/// Deterministic, cleaned-up view of a [`RawMessage`].
///
/// Recomputed on every pipeline run, never persisted. Lowercased fields
/// drive lexicon and taxonomy matching; the `original_*` fields preserve
/// casing for entity extraction (names and companies are case-sensitive).
#[derive(Debug, Clone)]
pub struct NormalizedDocument {
    /// Lowercased, whitespace-collapsed subject.
    pub subject: String,
    /// Lowercased body with quoted replies and signature blocks removed.
    pub body: String,
    /// Subject + body tokens in source order, lowercased.
    pub tokens: Vec<String>,
    /// Case-preserved subject after whitespace collapsing.
    pub original_subject: String,
    /// Case-preserved body after reply/signature stripping.
    pub original_body: String,
    /// Lowercased domain part of the sender address, or empty.
    pub sender_domain: String,
}

impl NormalizedDocument {
    /// True when normalization produced no usable text at all.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_constructor_fills_defaults() {
        let msg = RawMessage::plain("m-1", "Hello", "body", "a@b.com");
        assert_eq!(msg.id, "m-1");
        assert!(msg.body_html.is_none());
        assert!(msg.sender.name.is_none());
        assert_eq!(msg.sender.address, "a@b.com");
    }
}
