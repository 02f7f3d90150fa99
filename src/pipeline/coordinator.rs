//! Pipeline coordinator — sequences normalize → classify → extract and
//! enforces the engine's execution contracts.
//!
//! Per-message state machine:
//! `unprocessed → classifying → classified → extracting → extracted →
//! needs_review | ready_for_response`.
//!
//! Contracts:
//! - Classification never fails on valid input; malformed messages degrade
//!   to `needs_review` with confidence 0.
//! - At most one in-flight run per message id; a concurrent duplicate
//!   waits for and shares the in-flight outcome.
//! - Re-running at the same feature-store revision returns the same
//!   outcome content (here: the memoized outcome itself).
//! - No partial state: an outcome is only published after classification
//!   and (if applicable) extraction both complete.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{FeedbackError, Result};
use crate::feedback::FeedbackIncorporator;
use crate::message::RawMessage;
use crate::normalize::normalize;
use crate::pipeline::classifier::{Classifier, LexiconScorer, Scorer};
use crate::pipeline::extract::Extractor;
use crate::pipeline::types::{
    Category, ClassificationResult, MessageStatus, ProcessOutcome,
};
use crate::store::{FeatureSnapshot, FeatureStore, FeedbackRecord};

/// The classification & extraction engine. The only two entry points the
/// surrounding system calls are [`Engine::process`] (and its batch/pinned
/// variants) and [`Engine::submit_feedback`].
pub struct Engine {
    config: EngineConfig,
    store: Arc<FeatureStore>,
    classifier: Classifier,
    extractor: Extractor,
    incorporator: FeedbackIncorporator,
    /// Completed outcomes keyed by (message id, revision). Makes re-runs
    /// idempotent and lets a duplicate request return the earlier result.
    /// Grows one entry per message per revision; durable storage lives
    /// with the caller, who can prune via [`Engine::evict_before`].
    completed: Mutex<HashMap<(String, u64), ProcessOutcome>>,
    /// Results by id, for feedback lookups. Pruned with `completed`.
    results: Mutex<HashMap<Uuid, ClassificationResult>>,
    /// Single-flight cells, keyed by message id.
    inflight: Mutex<HashMap<String, Arc<OnceCell<ProcessOutcome>>>>,
}

impl Engine {
    /// Engine with the rule-based lexicon scorer.
    pub fn new(config: EngineConfig, store: Arc<FeatureStore>) -> Self {
        let scorer = Arc::new(LexiconScorer::new(config.subject_multiplier));
        Self::with_scorer(config, store, scorer)
    }

    /// Engine with a custom scoring backend (e.g. a statistical model).
    /// Aggregation, tie-break, and review routing stay pipeline-owned.
    pub fn with_scorer(
        config: EngineConfig,
        store: Arc<FeatureStore>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        let classifier = Classifier::new(scorer, config.known_customer_bonus);
        let incorporator = FeedbackIncorporator::new(&config);
        Self {
            config,
            store,
            classifier,
            extractor: Extractor::new(),
            incorporator,
            completed: Mutex::new(HashMap::new()),
            results: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<FeatureStore> {
        &self.store
    }

    /// Drop memoized outcomes and feedback lookups produced against
    /// revisions older than `revision`. The engine holds no durable
    /// state, so callers that persist outcomes externally can evict once
    /// a revision is no longer replayed or corrected against.
    pub fn evict_before(&self, revision: u64) {
        self.completed.lock().unwrap().retain(|k, _| k.1 >= revision);
        self.results
            .lock()
            .unwrap()
            .retain(|_, r| r.lexicon_revision >= revision);
    }

    /// Process one message against the latest feature-store revision.
    ///
    /// Infallible: malformed input degrades to `needs_review` instead of
    /// erroring. Guarantees at most one in-flight run per message id: a
    /// concurrent call for the same id awaits the in-flight run and
    /// returns its outcome instead of starting a duplicate.
    pub async fn process(&self, message: RawMessage) -> ProcessOutcome {
        let key = message.id.clone();
        let cell = {
            let mut inflight = self.inflight.lock().unwrap();
            Arc::clone(inflight.entry(key.clone()).or_default())
        };

        let outcome = cell
            .get_or_init(|| async {
                let snapshot = self.store.latest();
                self.run(&message, &snapshot)
            })
            .await
            .clone();

        self.inflight.lock().unwrap().remove(&key);
        outcome
    }

    /// Process a batch of independent messages. Outcomes come back in
    /// input order, one per message; per-message review routing is
    /// unaffected by the batch.
    pub async fn process_batch(&self, messages: Vec<RawMessage>) -> Vec<ProcessOutcome> {
        let count = messages.len();
        info!(count, "Processing message batch");

        let mut outcomes = Vec::with_capacity(count);
        for message in messages {
            outcomes.push(self.process(message).await);
        }

        info!(count, "Batch processing complete");
        outcomes
    }

    /// Reproduce a run against a pinned historical revision. Fails with
    /// [`crate::error::StoreError::RevisionNotFound`] for unknown revisions;
    /// no partial result is returned in that case.
    pub fn process_at(&self, message: &RawMessage, revision: u64) -> Result<ProcessOutcome> {
        let snapshot = self.store.snapshot(revision)?;
        Ok(self.run(message, &snapshot))
    }

    /// Record a human correction for a previously returned classification.
    /// Returns the feature-store revision in effect afterwards. Conflicting
    /// submissions are never rejected: feedback always applies against the
    /// latest revision, and the record keeps the original for audit.
    pub fn submit_feedback(
        &self,
        result_id: Uuid,
        corrected_category: Category,
        note: &str,
    ) -> Result<u64> {
        let superseded = {
            let results = self.results.lock().unwrap();
            results
                .get(&result_id)
                .cloned()
                .ok_or(FeedbackError::UnknownResult(result_id))?
        };

        let record = FeedbackRecord {
            id: Uuid::new_v4(),
            result_id,
            message_id: superseded.message_id.clone(),
            corrected_category,
            reviewer_note: note.to_string(),
            original_revision: superseded.lexicon_revision,
            applied_at: Utc::now(),
        };

        info!(
            %result_id,
            from = superseded.category.label(),
            to = corrected_category.label(),
            "Feedback submitted"
        );
        Ok(self.incorporator.apply(&self.store, record, &superseded))
    }

    /// One synchronous pipeline run. Pure over (message, snapshot) except
    /// for result bookkeeping; abandoning the caller mid-run leaves no
    /// partial state because nothing is published until the end.
    fn run(&self, message: &RawMessage, snapshot: &FeatureSnapshot) -> ProcessOutcome {
        let key = (message.id.clone(), snapshot.revision);
        if let Some(prior) = self.completed.lock().unwrap().get(&key) {
            debug!(
                message_id = %message.id,
                revision = snapshot.revision,
                "Returning memoized outcome"
            );
            return prior.clone();
        }

        let mut status = MessageStatus::Classifying;
        debug!(message_id = %message.id, status = status.label(), "Pipeline started");

        let doc = normalize(message);
        let classification = self.classifier.classify(&message.id, &doc, snapshot);
        status = MessageStatus::Classified;

        let review = classification.confidence < self.config.review_threshold
            || matches!(
                classification.category,
                Category::NeedsReview | Category::NotRelevant
            );

        // Policy: extraction still runs for reviewed messages (so the
        // reviewer has context) unless configured off.
        let extract = if !review {
            true
        } else if classification.category == Category::NotRelevant {
            self.config.extract_on_not_relevant
        } else {
            self.config.extract_on_review
        };

        let extraction = if extract {
            status = MessageStatus::Extracting;
            debug!(message_id = %message.id, status = status.label(), "Extracting fields");
            let result = self.extractor.extract(message, &doc, snapshot);
            status = MessageStatus::Extracted;
            Some(result)
        } else {
            None
        };

        let final_status = if review {
            MessageStatus::NeedsReview
        } else {
            MessageStatus::ReadyForResponse
        };
        debug!(
            message_id = %message.id,
            from = status.label(),
            to = final_status.label(),
            "Pipeline finished"
        );

        let outcome = ProcessOutcome {
            message_id: message.id.clone(),
            classification: classification.clone(),
            extraction,
            status: final_status,
        };

        info!(
            message_id = %message.id,
            category = classification.category.label(),
            confidence = classification.confidence,
            revision = snapshot.revision,
            status = final_status.label(),
            "Processed message"
        );

        self.results
            .lock()
            .unwrap()
            .insert(classification.id, classification);
        self.completed.lock().unwrap().insert(key, outcome.clone());
        outcome
    }
}
