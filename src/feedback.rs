//! Feedback incorporator — folds human corrections back into the lexicon.
//!
//! On a correction, the terms that fired for the wrongly-predicted
//! category are decayed toward zero there and boosted for the corrected
//! category, clamped to the configured weight bounds to prevent runaway
//! drift. The mutation publishes a new feature-store revision; prior
//! revisions stay untouched, so historical classifications remain
//! explainable against the revision that produced them.
//!
//! In `LogOnly` mode (statistical scorer) the record is appended to the
//! audit log without touching any lexicon; retraining happens offline.

use tracing::{debug, info};

use crate::config::{EngineConfig, FeedbackMode};
use crate::pipeline::types::ClassificationResult;
use crate::store::{FeatureSnapshot, FeatureStore, FeedbackRecord, LexiconEntry};

/// Synthetic matched terms (domain bonuses) are not lexicon terms and are
/// skipped during weight adjustment.
const SYNTHETIC_PREFIX: &str = "sender-domain:";

pub struct FeedbackIncorporator {
    min_weight: f64,
    max_weight: f64,
    decay: f64,
    boost: f64,
    mode: FeedbackMode,
}

impl FeedbackIncorporator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            min_weight: config.min_weight,
            max_weight: config.max_weight,
            decay: config.feedback_decay,
            boost: config.feedback_boost,
            mode: config.feedback_mode,
        }
    }

    /// Apply one correction. Appends the record to the audit log and, in
    /// `Online` mode, publishes an adjusted revision. Always applies
    /// against the latest revision; the record keeps `original_revision`
    /// for audit when the two differ. Returns the resulting revision.
    pub fn apply(
        &self,
        store: &FeatureStore,
        record: FeedbackRecord,
        superseded: &ClassificationResult,
    ) -> u64 {
        let corrected = record.corrected_category;
        let wrong = superseded.category;
        store.append_feedback(record);

        if self.mode == FeedbackMode::LogOnly {
            debug!(
                corrected = corrected.label(),
                "Feedback logged for offline retraining"
            );
            return store.latest_revision();
        }
        if wrong == corrected {
            // Confirmation, not a correction; nothing to adjust.
            return store.latest_revision();
        }

        let fired: Vec<&str> = superseded
            .matched_terms
            .iter()
            .filter(|t| t.category == wrong && !t.term.starts_with(SYNTHETIC_PREFIX))
            .map(|t| t.term.as_str())
            .collect();
        if fired.is_empty() {
            return store.latest_revision();
        }

        let snapshot = store.publish(|latest| {
            let mut next = latest.clone();
            for term in &fired {
                self.decay_weight(&mut next, wrong, term);
                self.boost_weight(&mut next, corrected, term);
            }
            next
        });

        info!(
            from = wrong.label(),
            to = corrected.label(),
            terms = fired.len(),
            revision = snapshot.revision,
            "Applied feedback correction"
        );
        snapshot.revision
    }

    fn decay_weight(
        &self,
        snapshot: &mut FeatureSnapshot,
        category: crate::pipeline::types::Category,
        term: &str,
    ) {
        if let Some(entry) = snapshot
            .lexicons
            .get_mut(&category)
            .and_then(|lex| lex.get_mut(term))
        {
            entry.weight =
                (entry.weight * (1.0 - self.decay)).clamp(self.min_weight, self.max_weight);
        }
    }

    fn boost_weight(
        &self,
        snapshot: &mut FeatureSnapshot,
        category: crate::pipeline::types::Category,
        term: &str,
    ) {
        let lexicon = snapshot.lexicons.entry(category).or_default();
        let entry = lexicon
            .entry(term.to_string())
            .or_insert_with(|| LexiconEntry::weighted(0.0));
        entry.weight = (entry.weight + self.boost).clamp(self.min_weight, self.max_weight);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Category, MatchedTerm};
    use chrono::Utc;
    use uuid::Uuid;

    fn superseded(terms: Vec<MatchedTerm>, category: Category) -> ClassificationResult {
        ClassificationResult {
            id: Uuid::new_v4(),
            message_id: "m-1".into(),
            category,
            confidence: 0.9,
            matched_terms: terms,
            lexicon_revision: 0,
            classified_by: "algorithm".into(),
            classified_at: Utc::now(),
        }
    }

    fn record(corrected: Category) -> FeedbackRecord {
        FeedbackRecord {
            id: Uuid::new_v4(),
            result_id: Uuid::new_v4(),
            message_id: "m-1".into(),
            corrected_category: corrected,
            reviewer_note: "misfiled".into(),
            original_revision: 0,
            applied_at: Utc::now(),
        }
    }

    fn term(t: &str, category: Category, weight: f64) -> MatchedTerm {
        MatchedTerm {
            term: t.into(),
            category,
            weight,
        }
    }

    #[test]
    fn correction_decays_wrong_and_boosts_corrected() {
        let store = FeatureStore::with_defaults();
        let before = store.latest();
        let old_wrong = before.lexicons[&Category::NewCustomerLead]["pricing"].weight;

        let inc = FeedbackIncorporator::new(&EngineConfig::default());
        let result = superseded(
            vec![term("pricing", Category::NewCustomerLead, 2.0)],
            Category::NewCustomerLead,
        );
        let rev = inc.apply(&store, record(Category::InformationRequest), &result);
        assert_eq!(rev, 1);

        let after = store.latest();
        let new_wrong = after.lexicons[&Category::NewCustomerLead]["pricing"].weight;
        let new_right = after.lexicons[&Category::InformationRequest]["pricing"].weight;
        assert!(new_wrong < old_wrong);
        assert!(new_wrong >= 0.0);
        assert_eq!(new_right, 0.5);
    }

    #[test]
    fn weights_clamped_to_bounds() {
        let config = EngineConfig {
            max_weight: 0.3,
            ..EngineConfig::default()
        };
        let store = FeatureStore::with_defaults();
        let inc = FeedbackIncorporator::new(&config);
        let result = superseded(
            vec![term("pricing", Category::NewCustomerLead, 2.0)],
            Category::NewCustomerLead,
        );
        inc.apply(&store, record(Category::InformationRequest), &result);

        let after = store.latest();
        assert_eq!(
            after.lexicons[&Category::InformationRequest]["pricing"].weight,
            0.3
        );
    }

    #[test]
    fn log_only_mode_does_not_mutate_lexicon() {
        let config = EngineConfig {
            feedback_mode: FeedbackMode::LogOnly,
            ..EngineConfig::default()
        };
        let store = FeatureStore::with_defaults();
        let inc = FeedbackIncorporator::new(&config);
        let result = superseded(
            vec![term("pricing", Category::NewCustomerLead, 2.0)],
            Category::NewCustomerLead,
        );
        let rev = inc.apply(&store, record(Category::InformationRequest), &result);

        assert_eq!(rev, 0);
        assert_eq!(store.feedback_log().len(), 1);
    }

    #[test]
    fn confirmation_appends_log_without_new_revision() {
        let store = FeatureStore::with_defaults();
        let inc = FeedbackIncorporator::new(&EngineConfig::default());
        let result = superseded(
            vec![term("pricing", Category::NewCustomerLead, 2.0)],
            Category::NewCustomerLead,
        );
        let rev = inc.apply(&store, record(Category::NewCustomerLead), &result);
        assert_eq!(rev, 0);
        assert_eq!(store.feedback_log().len(), 1);
    }

    #[test]
    fn synthetic_domain_terms_are_skipped() {
        let store = FeatureStore::with_defaults();
        let inc = FeedbackIncorporator::new(&EngineConfig::default());
        let result = superseded(
            vec![term(
                "sender-domain:customer.com",
                Category::ExistingCustomerInquiry,
                5.0,
            )],
            Category::ExistingCustomerInquiry,
        );
        let rev = inc.apply(&store, record(Category::NotRelevant), &result);
        // Nothing adjustable fired, so no new revision.
        assert_eq!(rev, 0);
        assert!(!store.latest().lexicons[&Category::NotRelevant]
            .contains_key("sender-domain:customer.com"));
    }

    #[test]
    fn only_wrong_category_terms_are_adjusted() {
        let store = FeatureStore::with_defaults();
        let before_info = store.latest().lexicons[&Category::InformationRequest]["question"].weight;
        let inc = FeedbackIncorporator::new(&EngineConfig::default());
        let result = superseded(
            vec![
                term("pricing", Category::NewCustomerLead, 2.0),
                term("question", Category::InformationRequest, 1.5),
            ],
            Category::NewCustomerLead,
        );
        inc.apply(&store, record(Category::ExistingCustomerInquiry), &result);

        let after = store.latest();
        // "question" fired for information_request, which was neither the
        // predicted nor the corrected category; untouched.
        assert_eq!(
            after.lexicons[&Category::InformationRequest]["question"].weight,
            before_info
        );
        assert!(after.lexicons[&Category::ExistingCustomerInquiry].contains_key("pricing"));
    }
}
