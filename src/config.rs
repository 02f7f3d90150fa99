//! Configuration types.

use serde::{Deserialize, Serialize};

/// How the engine reacts to human feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackMode {
    /// Mutate the lexicon synchronously (rule-based scorer).
    Online,
    /// Record the feedback for offline retraining only (statistical scorer).
    LogOnly,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Classifications below this confidence are routed to human review.
    pub review_threshold: f64,
    /// Weight multiplier for lexicon terms matched in the subject line (≥ 1).
    pub subject_multiplier: f64,
    /// Additive bonus to `existing_customer_inquiry` when the sender domain
    /// is on the known-customer list. Applied before confidence normalization.
    pub known_customer_bonus: f64,
    /// Lower bound for lexicon weights after feedback adjustment.
    pub min_weight: f64,
    /// Upper bound for lexicon weights after feedback adjustment.
    pub max_weight: f64,
    /// Fraction of a wrong-category weight removed per correction, in [0, 1].
    pub feedback_decay: f64,
    /// Amount added to the corrected category's weight per correction.
    pub feedback_boost: f64,
    /// Run extraction even when the message is routed to review, so the
    /// reviewer has context.
    pub extract_on_review: bool,
    /// Run extraction for messages classified `not_relevant`.
    pub extract_on_not_relevant: bool,
    /// Feedback handling mode.
    pub feedback_mode: FeedbackMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            review_threshold: 0.6,
            subject_multiplier: 2.0,
            known_customer_bonus: 5.0,
            min_weight: -5.0,
            max_weight: 5.0,
            feedback_decay: 0.5,
            feedback_boost: 0.5,
            extract_on_review: true,
            extract_on_not_relevant: true,
            feedback_mode: FeedbackMode::Online,
        }
    }
}
