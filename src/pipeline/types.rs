//! Shared types for the classification & extraction pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Categories ──────────────────────────────────────────────────────

/// Email category assigned by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    NewCustomerLead,
    ExistingCustomerInquiry,
    InformationRequest,
    NotRelevant,
    NeedsReview,
}

impl Category {
    /// All categories, in the fixed scoring/tie-inspection order.
    pub const ALL: [Category; 5] = [
        Category::NewCustomerLead,
        Category::ExistingCustomerInquiry,
        Category::InformationRequest,
        Category::NotRelevant,
        Category::NeedsReview,
    ];

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::NewCustomerLead => "new_customer_lead",
            Self::ExistingCustomerInquiry => "existing_customer_inquiry",
            Self::InformationRequest => "information_request",
            Self::NotRelevant => "not_relevant",
            Self::NeedsReview => "needs_review",
        }
    }
}

// ── Classification ──────────────────────────────────────────────────

/// A lexicon term that fired during scoring, with its effective weight
/// (subject multiplier and domain bonus already applied).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTerm {
    pub term: String,
    pub category: Category,
    pub weight: f64,
}

/// Outcome of classifying one message against one feature-store revision.
///
/// Immutable once created; a re-classification after feedback supersedes
/// it with a new result rather than mutating this one. The score of every
/// category — and therefore the confidence — is reproducible by summing
/// `matched_terms` per category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub id: Uuid,
    pub message_id: String,
    pub category: Category,
    /// Winning score normalized by the sum of absolute category scores.
    pub confidence: f64,
    pub matched_terms: Vec<MatchedTerm>,
    /// Feature-store revision the scores were computed against.
    pub lexicon_revision: u64,
    /// Provenance tag, `"algorithm"` for engine-produced results.
    pub classified_by: String,
    pub classified_at: DateTime<Utc>,
}

impl ClassificationResult {
    /// Content equality, ignoring the run-specific id and timestamp.
    /// This is the idempotence contract for re-runs at a fixed revision.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
            && self.category == other.category
            && self.confidence == other.confidence
            && self.matched_terms == other.matched_terms
            && self.lexicon_revision == other.lexicon_revision
    }

    /// Recompute a category's aggregate score from the matched terms.
    pub fn score_for(&self, category: Category) -> f64 {
        self.matched_terms
            .iter()
            .filter(|t| t.category == category)
            .map(|t| t.weight)
            .sum()
    }
}

// ── Extraction ──────────────────────────────────────────────────────

/// Contact details pulled from the message. Every populated field traces
/// back to a substring or pattern match in the message text, or to the
/// sender header (name fallback only).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
}

impl ContactInfo {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.phone.is_none() && self.company.is_none()
    }
}

/// A product the sender showed interest in, matched against the taxonomy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInterest {
    /// Canonical product name from the taxonomy.
    pub product: String,
    /// 1.0 for an exact alias match, lower for fuzzy matches.
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    #[default]
    Low,
    Medium,
    High,
}

/// Urgency level plus the indicator phrases that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UrgencyAssessment {
    pub level: Urgency,
    /// Matched indicator phrases, kept for explainability.
    pub indicators: Vec<String>,
}

/// Contact channel the sender explicitly asked for. Never defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Email,
    Phone,
}

/// Structured fields extracted from one message. Each sub-extraction is
/// best-effort; a sub-extractor failure leaves its field absent and adds
/// a note to `diagnostics` instead of failing the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub contact_info: ContactInfo,
    pub product_interests: Vec<ProductInterest>,
    pub questions: Vec<String>,
    pub urgency: UrgencyAssessment,
    pub preferred_contact_method: Option<ContactMethod>,
    pub diagnostics: Vec<String>,
    pub extracted_at: DateTime<Utc>,
}

impl ExtractionResult {
    /// An extraction with every field absent (empty message, gated run).
    pub fn empty() -> Self {
        Self {
            contact_info: ContactInfo::default(),
            product_interests: Vec::new(),
            questions: Vec::new(),
            urgency: UrgencyAssessment::default(),
            preferred_contact_method: None,
            diagnostics: Vec::new(),
            extracted_at: Utc::now(),
        }
    }

    /// Content equality, ignoring the timestamp.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.contact_info == other.contact_info
            && self.product_interests == other.product_interests
            && self.questions == other.questions
            && self.urgency == other.urgency
            && self.preferred_contact_method == other.preferred_contact_method
            && self.diagnostics == other.diagnostics
    }
}

// ── Pipeline status ─────────────────────────────────────────────────

/// Per-message processing state machine:
/// `Unprocessed → Classifying → Classified → Extracting → Extracted →
/// NeedsReview | ReadyForResponse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Unprocessed,
    Classifying,
    Classified,
    Extracting,
    Extracted,
    NeedsReview,
    ReadyForResponse,
}

impl MessageStatus {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::Classifying => "classifying",
            Self::Classified => "classified",
            Self::Extracting => "extracting",
            Self::Extracted => "extracted",
            Self::NeedsReview => "needs_review",
            Self::ReadyForResponse => "ready_for_response",
        }
    }
}

// ── Pipeline outcome ────────────────────────────────────────────────

/// Result of processing one message through the full pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessOutcome {
    pub message_id: String,
    pub classification: ClassificationResult,
    /// `None` when extraction was gated off by configuration.
    pub extraction: Option<ExtractionResult>,
    pub status: MessageStatus,
}

impl ProcessOutcome {
    /// Content equality, ignoring run-specific ids and timestamps.
    pub fn content_eq(&self, other: &Self) -> bool {
        self.message_id == other.message_id
            && self.status == other.status
            && self.classification.content_eq(&other.classification)
            && match (&self.extraction, &other.extraction) {
                (Some(a), Some(b)) => a.content_eq(b),
                (None, None) => true,
                _ => false,
            }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_labels_round_trip_serde() {
        for cat in Category::ALL {
            let json = serde_json::to_value(cat).unwrap();
            assert_eq!(json, serde_json::Value::String(cat.label().to_string()));
            let back: Category = serde_json::from_value(json).unwrap();
            assert_eq!(back, cat);
        }
    }

    #[test]
    fn score_for_sums_matched_terms() {
        let result = ClassificationResult {
            id: Uuid::new_v4(),
            message_id: "m".into(),
            category: Category::NewCustomerLead,
            confidence: 1.0,
            matched_terms: vec![
                MatchedTerm {
                    term: "pricing".into(),
                    category: Category::NewCustomerLead,
                    weight: 4.0,
                },
                MatchedTerm {
                    term: "need".into(),
                    category: Category::NewCustomerLead,
                    weight: 0.5,
                },
                MatchedTerm {
                    term: "question".into(),
                    category: Category::InformationRequest,
                    weight: 1.5,
                },
            ],
            lexicon_revision: 0,
            classified_by: "algorithm".into(),
            classified_at: Utc::now(),
        };
        assert_eq!(result.score_for(Category::NewCustomerLead), 4.5);
        assert_eq!(result.score_for(Category::InformationRequest), 1.5);
        assert_eq!(result.score_for(Category::NotRelevant), 0.0);
    }

    #[test]
    fn urgency_orders_low_to_high() {
        assert!(Urgency::Low < Urgency::Medium);
        assert!(Urgency::Medium < Urgency::High);
    }

    #[test]
    fn empty_extraction_has_all_fields_absent() {
        let e = ExtractionResult::empty();
        assert!(e.contact_info.is_empty());
        assert!(e.product_interests.is_empty());
        assert!(e.questions.is_empty());
        assert_eq!(e.urgency.level, Urgency::Low);
        assert!(e.urgency.indicators.is_empty());
        assert!(e.preferred_contact_method.is_none());
    }
}
