//! Classification & extraction pipeline.
//!
//! All inbound messages flow through:
//! 1. `normalize` — markup/signature stripping, tokenization
//! 2. `Classifier` — lexicon (or pluggable) scoring → category + confidence
//! 3. `Extractor` — contact info, product interests, questions, urgency
//! 4. Review routing — low confidence or ambiguity always goes to a human
//!
//! The [`coordinator::Engine`] sequences these and enforces idempotence
//! and per-message single-flight execution.

pub mod classifier;
pub mod coordinator;
pub mod extract;
pub mod types;

pub use coordinator::Engine;
pub use types::{Category, MessageStatus, ProcessOutcome};
