//! Text normalizer — turns a raw email into a [`NormalizedDocument`].
//!
//! Prefers `body_text`; falls back to HTML-stripped `body_html` only when
//! the plain body is empty or whitespace. Strips quoted-reply blocks and
//! signature blocks, collapses whitespace, and lowercases for matching
//! while keeping a case-preserved copy for entity extraction.
//!
//! Never fails: an empty or malformed message yields a document with zero
//! tokens, which the classifier maps to `needs_review` with confidence 0.

use regex::Regex;
use std::sync::LazyLock;

use crate::message::{NormalizedDocument, RawMessage};

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Attribution line that introduces a quoted reply, e.g.
/// "On Mon, Jan 2 at 3:45 PM Alice <alice@x.com> wrote:".
static REPLY_ATTRIBUTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)wrote:\s*$").unwrap());

/// Signature delimiter: a line consisting solely of two or more dashes.
static SIGNATURE_DELIM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*-{2,}\s*$").unwrap());

/// Normalize a raw message into the document the classifier and extractor read.
pub fn normalize(msg: &RawMessage) -> NormalizedDocument {
    let body_source = if msg.body_text.trim().is_empty() {
        msg.body_html.as_deref().map(strip_html).unwrap_or_default()
    } else {
        msg.body_text.clone()
    };

    let original_body = clean_body(&body_source);
    let original_subject = collapse_whitespace(&msg.subject);

    let subject = original_subject.to_lowercase();
    let body = original_body.to_lowercase();

    let mut tokens: Vec<String> = tokenize(&subject);
    tokens.extend(tokenize(&body));

    NormalizedDocument {
        subject,
        body,
        tokens,
        original_subject,
        original_body,
        sender_domain: sender_domain(&msg.sender.address),
    }
}

/// Remove HTML tags and unescape the common entities.
pub fn strip_html(html: &str) -> String {
    let stripped = HTML_TAG.replace_all(html, " ");
    stripped
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
}

/// Strip quoted replies and signature blocks, then collapse whitespace
/// per line and drop blank lines.
fn clean_body(body: &str) -> String {
    let mut kept: Vec<String> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        // Everything from the attribution line down is the quoted thread.
        if REPLY_ATTRIBUTION.is_match(trimmed) {
            break;
        }
        // Everything from the delimiter down is the signature.
        if SIGNATURE_DELIM.is_match(trimmed) {
            break;
        }
        // Quoted-reply lines inline in the body.
        if trimmed.starts_with('>') {
            continue;
        }
        if trimmed.is_empty() {
            kept.push(String::new());
            continue;
        }
        kept.push(collapse_whitespace(trimmed));
    }
    // Drop leading/trailing blank lines, collapse runs of blanks to one.
    let mut out: Vec<&str> = Vec::new();
    for line in kept.iter().map(String::as_str) {
        if line.is_empty() && out.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        out.push(line);
    }
    while out.last().is_some_and(|l| l.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn sender_domain(address: &str) -> String {
    address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim().to_lowercase())
        .unwrap_or_default()
}

/// Word-boundary containment check used by lexicon and taxonomy matching.
///
/// Works uniformly for single words and multi-word phrases: `term` must
/// appear in `text` with no alphanumeric character directly on either side.
pub(crate) fn has_term(text: &str, term: &str) -> bool {
    if term.is_empty() {
        return false;
    }
    let mut start = 0;
    while let Some(pos) = text[start..].find(term) {
        let at = start + pos;
        let end = at + term.len();
        let before_ok = text[..at].chars().next_back().is_none_or(|c| !c.is_alphanumeric());
        let after_ok = text[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = end;
    }
    false
}
