//! Extractor — pulls structured fields out of a normalized document.
//!
//! Every sub-extraction is independently best-effort: failing to find a
//! value leaves the field absent, and a malformed candidate (e.g. a
//! phone-like digit run that fails validation) is noted in `diagnostics`
//! without affecting the other fields. Extraction failures never escalate
//! to classification failures.
//!
//! Grounding rule: every populated field traces to a substring or pattern
//! match in the message text. The one exception is the contact name,
//! which may fall back to the sender header.

use chrono::Utc;
use regex::Regex;
use tracing::debug;

use crate::message::{NormalizedDocument, RawMessage};
use crate::normalize::has_term;
use crate::pipeline::types::{
    ContactInfo, ContactMethod, ExtractionResult, ProductInterest, Urgency, UrgencyAssessment,
};
use crate::store::FeatureSnapshot;

/// Phone candidates outside this digit range are rejected as malformed.
const PHONE_MIN_DIGITS: usize = 7;
const PHONE_MAX_DIGITS: usize = 15;

/// Strong urgency indicators → High.
const STRONG_URGENCY: [&str; 6] = [
    "asap",
    "urgent",
    "urgently",
    "immediately",
    "emergency",
    "right away",
];

/// Soft urgency indicators → Medium (when nothing strong matched).
const SOFT_URGENCY: [&str; 5] = [
    "deadline",
    "soon",
    "end of week",
    "end of day",
    "time sensitive",
];

/// Imperative request phrases treated as implicit questions.
const REQUEST_PHRASES: [&str; 8] = [
    "please send",
    "please provide",
    "please share",
    "could you provide",
    "could you send",
    "can you send",
    "can you share",
    "let me know",
];

/// Consumer mail domains that never imply a company name.
const FREEMAIL_DOMAINS: [&str; 11] = [
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "proton.me",
    "protonmail.com",
    "live.com",
    "msn.com",
];

/// Field extractor with its patterns compiled once at construction.
pub struct Extractor {
    email_re: Regex,
    phone_re: Regex,
    company_at_re: Regex,
    near_date_re: Regex,
    signoff_re: Regex,
    name_line_re: Regex,
    phone_pref_re: Regex,
    email_pref_re: Regex,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    pub fn new() -> Self {
        Self {
            email_re: Regex::new(r"[a-z0-9][a-z0-9._%+-]*@[a-z0-9][a-z0-9.-]*\.[a-z]{2,}").unwrap(),
            // Country code, separators, and a trailing extension are all
            // tolerated; digit-count validation happens afterwards.
            phone_re: Regex::new(r"\+?\d[\d\s().\-]{5,}\d(?:\s*(?:x|ext\.?)\s*\d{1,5})?").unwrap(),
            company_at_re: Regex::new(
                r"\bat\s+([A-Z][A-Za-z0-9&'-]*(?:\s+[A-Z][A-Za-z0-9&'-]*){0,3})",
            )
            .unwrap(),
            near_date_re: Regex::new(
                r"(?i)\bneed\b.{0,60}?\bby\s+(?:monday|tuesday|wednesday|thursday|friday|saturday|sunday|tomorrow|next week|\d{1,2}[/-]\d{1,2})",
            )
            .unwrap(),
            signoff_re: Regex::new(
                r"(?i)^(thanks|thank you|many thanks|best|best regards|regards|kind regards|sincerely|cheers)[,!.]?$",
            )
            .unwrap(),
            name_line_re: Regex::new(r"^[A-Z][A-Za-z'.-]*(?:\s+[A-Z][A-Za-z'.-]*){0,3}$").unwrap(),
            phone_pref_re: Regex::new(
                r"(?i)\b(please\s+call|call\s+me|give\s+me\s+a\s+call|phone\s+me|reach\s+me\s+by\s+phone)\b",
            )
            .unwrap(),
            email_pref_re: Regex::new(
                r"(?i)\b(email\s+me|please\s+email|reply\s+by\s+email|send\s+me\s+an\s+email|reach\s+me\s+by\s+email)\b",
            )
            .unwrap(),
        }
    }

    /// Extract all fields from one document against a pinned snapshot.
    ///
    /// An empty document yields an empty result: with no text there is no
    /// evidence, and no field may be populated without evidence.
    pub fn extract(
        &self,
        msg: &RawMessage,
        doc: &NormalizedDocument,
        snapshot: &FeatureSnapshot,
    ) -> ExtractionResult {
        if doc.is_empty() {
            return ExtractionResult::empty();
        }

        let mut diagnostics = Vec::new();

        let contact_info = ContactInfo {
            name: self.extract_name(msg, doc),
            email: self.extract_email(doc),
            phone: self.extract_phone(doc, &mut diagnostics),
            company: self.extract_company(doc),
        };
        let product_interests = self.extract_products(doc, snapshot);
        let questions = self.extract_questions(doc);
        let urgency = self.extract_urgency(doc);
        let preferred_contact_method = self.extract_preferred_contact(doc);

        debug!(
            message_id = %msg.id,
            products = product_interests.len(),
            questions = questions.len(),
            urgency = ?urgency.level,
            "Extraction complete"
        );

        ExtractionResult {
            contact_info,
            product_interests,
            questions,
            urgency,
            preferred_contact_method,
            diagnostics,
            extracted_at: Utc::now(),
        }
    }

    // ── Contact info ────────────────────────────────────────────────

    /// Email address appearing in the body text itself. The sender header
    /// is deliberately not a fallback here: the caller already has it on
    /// the raw message, and extracted fields must trace to message text.
    fn extract_email(&self, doc: &NormalizedDocument) -> Option<String> {
        self.email_re.find(&doc.body).map(|m| m.as_str().to_string())
    }

    fn extract_phone(&self, doc: &NormalizedDocument, diagnostics: &mut Vec<String>) -> Option<String> {
        for m in self.phone_re.find_iter(&doc.original_body) {
            let digits = m.as_str().chars().filter(char::is_ascii_digit).count();
            if (PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits) {
                return Some(m.as_str().trim().to_string());
            }
            diagnostics.push(format!(
                "phone candidate \"{}\" rejected: {} digits outside {}..={}",
                m.as_str().trim(),
                digits,
                PHONE_MIN_DIGITS,
                PHONE_MAX_DIGITS
            ));
        }
        None
    }

    /// Name from a signature closing line, else the sender header.
    fn extract_name(&self, msg: &RawMessage, doc: &NormalizedDocument) -> Option<String> {
        let lines: Vec<&str> = doc.original_body.lines().collect();
        for (i, line) in lines.iter().enumerate() {
            if !self.signoff_re.is_match(line.trim()) {
                continue;
            }
            // The name usually sits on the next line or two.
            for candidate in lines.iter().skip(i + 1).take(2) {
                let candidate = candidate.trim();
                if candidate.is_empty() {
                    continue;
                }
                if self.name_line_re.is_match(candidate) {
                    return Some(candidate.to_string());
                }
                break;
            }
        }
        msg.sender.name.clone()
    }

    fn extract_company(&self, doc: &NormalizedDocument) -> Option<String> {
        if let Some(caps) = self.company_at_re.captures(&doc.original_body) {
            return Some(caps[1].trim_end_matches(['.', ',']).to_string());
        }
        // Domain-to-company heuristic: first label of a non-consumer domain.
        let domain = doc.sender_domain.as_str();
        if domain.is_empty() || FREEMAIL_DOMAINS.contains(&domain) {
            return None;
        }
        let label = domain.split('.').next()?;
        if label.is_empty() {
            return None;
        }
        let mut chars = label.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().collect::<String>() + chars.as_str())
    }

    // ── Product interests ───────────────────────────────────────────

    /// Taxonomy alias matching: exact word-boundary hit scores 1.0, a
    /// token within edit distance 1 of an alias scores 0.8. Deduplicated
    /// by canonical name, keeping the highest confidence.
    fn extract_products(
        &self,
        doc: &NormalizedDocument,
        snapshot: &FeatureSnapshot,
    ) -> Vec<ProductInterest> {
        let mut interests: Vec<ProductInterest> = Vec::new();
        for entry in &snapshot.taxonomy {
            let mut best: Option<f64> = None;
            for alias in &entry.aliases {
                if has_term(&doc.subject, alias) || has_term(&doc.body, alias) {
                    best = Some(1.0);
                    break;
                }
                // Fuzzy pass only for single-word aliases long enough for
                // an edit distance of 1 to stay meaningful.
                if alias.len() >= 4 && !alias.contains(' ') {
                    let close = doc
                        .tokens
                        .iter()
                        .any(|t| levenshtein(t, alias) == 1);
                    if close {
                        best = Some(best.unwrap_or(0.0).max(0.8));
                    }
                }
            }
            if let Some(confidence) = best {
                interests.push(ProductInterest {
                    product: entry.canonical_name.clone(),
                    confidence,
                });
            }
        }
        interests
    }

    // ── Questions ───────────────────────────────────────────────────

    /// Sentences ending in `?`, plus imperative request phrases treated
    /// as implicit questions. Returned verbatim (trimmed) in source order.
    fn extract_questions(&self, doc: &NormalizedDocument) -> Vec<String> {
        let mut questions = Vec::new();
        if doc.original_subject.trim_end().ends_with('?') {
            questions.push(doc.original_subject.trim().to_string());
        }
        for sentence in split_sentences(&doc.original_body) {
            let trimmed = sentence.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.ends_with('?') {
                questions.push(trimmed.to_string());
                continue;
            }
            let lower = trimmed.to_lowercase();
            if REQUEST_PHRASES.iter().any(|p| has_term(&lower, p)) {
                questions.push(trimmed.to_string());
            }
        }
        questions
    }

    // ── Urgency ─────────────────────────────────────────────────────

    fn extract_urgency(&self, doc: &NormalizedDocument) -> UrgencyAssessment {
        let mut indicators = Vec::new();
        let mut level = Urgency::Low;

        for phrase in STRONG_URGENCY {
            if has_term(&doc.subject, phrase) || has_term(&doc.body, phrase) {
                indicators.push(phrase.to_string());
                level = Urgency::High;
            }
        }
        for phrase in SOFT_URGENCY {
            if has_term(&doc.subject, phrase) || has_term(&doc.body, phrase) {
                indicators.push(phrase.to_string());
                level = level.max(Urgency::Medium);
            }
        }
        if let Some(m) = self.near_date_re.find(&doc.body) {
            indicators.push(m.as_str().to_string());
            level = level.max(Urgency::Medium);
        }

        UrgencyAssessment { level, indicators }
    }

    // ── Preferred contact method ────────────────────────────────────

    /// Explicit statements only; when both channels are requested the one
    /// mentioned first wins. No default.
    fn extract_preferred_contact(&self, doc: &NormalizedDocument) -> Option<ContactMethod> {
        let phone_at = self.phone_pref_re.find(&doc.body).map(|m| m.start());
        let email_at = self.email_pref_re.find(&doc.body).map(|m| m.start());
        match (phone_at, email_at) {
            (Some(p), Some(e)) if e < p => Some(ContactMethod::Email),
            (Some(_), _) => Some(ContactMethod::Phone),
            (None, Some(_)) => Some(ContactMethod::Email),
            (None, None) => None,
        }
    }
}

/// Sentence split on terminal punctuation and line breaks, keeping the
/// terminator attached so `?` endings survive.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        match c {
            '.' | '!' | '?' => {
                current.push(c);
                sentences.push(std::mem::take(&mut current));
            }
            '\n' => {
                if !current.trim().is_empty() {
                    sentences.push(std::mem::take(&mut current));
                } else {
                    current.clear();
                }
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        sentences.push(current);
    }
    sentences
}

/// Classic two-row Levenshtein distance; inputs are short tokens.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
