//! Classifier — scores a normalized document against the category lexicons.
//!
//! The scorer is pluggable: anything implementing [`Scorer`] can replace
//! the lexicon scorer (e.g. a statistical model) without touching the
//! aggregation, tie-break, or confidence-normalization logic, which are
//! owned by [`Classifier`], not the scorer.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::message::NormalizedDocument;
use crate::normalize::has_term;
use crate::pipeline::types::{Category, ClassificationResult, MatchedTerm};
use crate::store::FeatureSnapshot;

/// Provenance tag for engine-produced classifications.
const CLASSIFIED_BY_ALGORITHM: &str = "algorithm";

/// Raw per-category scores plus the terms that produced them.
#[derive(Debug, Clone)]
pub struct ScoreBreakdown {
    /// Aggregate score per category. Every category appears, zero or not.
    pub scores: BTreeMap<Category, f64>,
    /// Terms that fired, with effective weights, in deterministic order.
    pub matched_terms: Vec<MatchedTerm>,
}

/// Capability a scoring backend must provide. Read-only over the snapshot;
/// must be safe to call concurrently from multiple pipeline runs.
pub trait Scorer: Send + Sync {
    fn score(&self, doc: &NormalizedDocument, snapshot: &FeatureSnapshot) -> ScoreBreakdown;
}

// ── Lexicon scorer ──────────────────────────────────────────────────

/// Rule-based scorer over the snapshot's weighted term lexicons.
///
/// A term contributes at most once regardless of repetition, unless marked
/// repeat-sensitive. Subject-line matches count at `subject_multiplier`
/// relative to body matches; a term present in both fields counts once at
/// the subject rate.
pub struct LexiconScorer {
    subject_multiplier: f64,
}

impl LexiconScorer {
    pub fn new(subject_multiplier: f64) -> Self {
        Self { subject_multiplier }
    }
}

impl Scorer for LexiconScorer {
    fn score(&self, doc: &NormalizedDocument, snapshot: &FeatureSnapshot) -> ScoreBreakdown {
        let mut scores = BTreeMap::new();
        let mut matched_terms = Vec::new();

        for category in Category::ALL {
            let mut total = 0.0;
            if let Some(lexicon) = snapshot.lexicon(category) {
                for (term, entry) in lexicon {
                    let effective = if entry.repeat_sensitive {
                        let subject_hits = doc.subject.matches(term.as_str()).count() as f64;
                        let body_hits = doc.body.matches(term.as_str()).count() as f64;
                        entry.weight * (subject_hits * self.subject_multiplier + body_hits)
                    } else if has_term(&doc.subject, term) {
                        entry.weight * self.subject_multiplier
                    } else if has_term(&doc.body, term) {
                        entry.weight
                    } else {
                        continue;
                    };
                    if effective == 0.0 {
                        continue;
                    }
                    total += effective;
                    matched_terms.push(MatchedTerm {
                        term: term.clone(),
                        category,
                        weight: effective,
                    });
                }
            }
            scores.insert(category, total);
        }

        ScoreBreakdown {
            scores,
            matched_terms,
        }
    }
}

// ── Classifier ──────────────────────────────────────────────────────

/// Pipeline-owned classification: scorer output + sender-domain bonus →
/// winner selection, tie-break, and confidence normalization.
pub struct Classifier {
    scorer: Arc<dyn Scorer>,
    known_customer_bonus: f64,
}

impl Classifier {
    pub fn new(scorer: Arc<dyn Scorer>, known_customer_bonus: f64) -> Self {
        Self {
            scorer,
            known_customer_bonus,
        }
    }

    /// Classify a document against a pinned snapshot.
    ///
    /// Never fails on valid input: empty documents, ties, and all-zero
    /// scores all map to `needs_review` with confidence 0. Ambiguity must
    /// never silently resolve to a business-impacting category.
    pub fn classify(
        &self,
        message_id: &str,
        doc: &NormalizedDocument,
        snapshot: &FeatureSnapshot,
    ) -> ClassificationResult {
        if doc.is_empty() {
            debug!(message_id, "Empty document, routing to review");
            return self.result(message_id, snapshot, Category::NeedsReview, 0.0, Vec::new());
        }

        let mut breakdown = self.scorer.score(doc, snapshot);

        // Known-customer domains add an explicit bonus term so confidence
        // stays reproducible from matched_terms alone.
        if self.known_customer_bonus != 0.0
            && snapshot.known_customer_domains.contains(&doc.sender_domain)
        {
            let entry = breakdown
                .scores
                .entry(Category::ExistingCustomerInquiry)
                .or_insert(0.0);
            *entry += self.known_customer_bonus;
            breakdown.matched_terms.push(MatchedTerm {
                term: format!("sender-domain:{}", doc.sender_domain),
                category: Category::ExistingCustomerInquiry,
                weight: self.known_customer_bonus,
            });
        }

        let (category, confidence) = aggregate(&breakdown.scores);

        debug!(
            message_id,
            category = category.label(),
            confidence,
            matched = breakdown.matched_terms.len(),
            "Classified document"
        );
        self.result(
            message_id,
            snapshot,
            category,
            confidence,
            breakdown.matched_terms,
        )
    }

    fn result(
        &self,
        message_id: &str,
        snapshot: &FeatureSnapshot,
        category: Category,
        confidence: f64,
        matched_terms: Vec<MatchedTerm>,
    ) -> ClassificationResult {
        ClassificationResult {
            id: Uuid::new_v4(),
            message_id: message_id.to_string(),
            category,
            confidence,
            matched_terms,
            lexicon_revision: snapshot.revision,
            classified_by: CLASSIFIED_BY_ALGORITHM.to_string(),
            classified_at: Utc::now(),
        }
    }
}

/// Winner selection and confidence normalization.
///
/// The highest strictly-positive score wins; an exact tie between two
/// categories, or no positive score at all, yields `needs_review` with
/// confidence 0. Confidence is the winning score over the sum of absolute
/// scores, so it always lands in [0, 1].
fn aggregate(scores: &BTreeMap<Category, f64>) -> (Category, f64) {
    let mut best: Option<(Category, f64)> = None;
    let mut tied = false;

    for (&category, &score) in scores {
        if score <= 0.0 {
            continue;
        }
        match best {
            None => best = Some((category, score)),
            Some((_, top)) if score > top => {
                best = Some((category, score));
                tied = false;
            }
            Some((_, top)) if score == top => tied = true,
            Some(_) => {}
        }
    }

    match best {
        Some((category, top)) if !tied => {
            let denom: f64 = scores.values().map(|s| s.abs()).sum();
            let confidence = if denom > 0.0 { top / denom } else { 0.0 };
            (category, confidence)
        }
        _ => (Category::NeedsReview, 0.0),
    }
}
