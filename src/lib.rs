//! mailminer — deterministic, explainable email classification &
//! extraction engine.
//!
//! Takes a plain (subject, body) pair plus a product taxonomy and produces
//! a confidence-scored category and a set of extracted facts. Ambiguous
//! mail is never silently misfiled: ties and low-confidence results are
//! routed to human review, and human corrections feed back into the
//! versioned lexicon without a retrain cycle.

pub mod config;
pub mod error;
pub mod feedback;
pub mod message;
pub mod normalize;
pub mod pipeline;
pub mod store;
