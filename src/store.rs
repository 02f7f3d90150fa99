//! Feature store — versioned lexicons, product taxonomy, and feedback log.
//!
//! The store is the engine's only shared mutable resource. Reads pin an
//! immutable snapshot (`Arc<FeatureSnapshot>`) so in-progress pipeline runs
//! never observe a partially-updated lexicon; writes are serialized and
//! publish a whole new revision atomically. Prior revisions stay
//! inspectable so historical classifications remain reproducible.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::StoreError;
use crate::pipeline::types::Category;

// ── Lexicon ─────────────────────────────────────────────────────────

/// One weighted term in a category's lexicon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LexiconEntry {
    /// Positive weight pulls toward the category, negative pushes away.
    pub weight: f64,
    /// Repeat-sensitive terms contribute per occurrence instead of once
    /// (e.g. a question-mark count). Everything else contributes at most
    /// once to avoid length bias.
    pub repeat_sensitive: bool,
}

impl LexiconEntry {
    pub fn weighted(weight: f64) -> Self {
        Self {
            weight,
            repeat_sensitive: false,
        }
    }
}

/// Term → entry map for one category. BTreeMap keeps scoring iteration
/// order deterministic.
pub type Lexicon = BTreeMap<String, LexiconEntry>;

// ── Taxonomy ────────────────────────────────────────────────────────

/// A product in the catalog, with the alias strings it may appear as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub canonical_name: String,
    pub aliases: BTreeSet<String>,
}

impl TaxonomyEntry {
    pub fn new(canonical_name: &str, aliases: &[&str]) -> Self {
        Self {
            canonical_name: canonical_name.to_string(),
            aliases: aliases.iter().map(|a| a.to_lowercase()).collect(),
        }
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// One immutable revision of the feature store. Classifier and extractor
/// read these; they are safe to share across concurrent pipeline runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSnapshot {
    pub revision: u64,
    pub lexicons: BTreeMap<Category, Lexicon>,
    pub taxonomy: Vec<TaxonomyEntry>,
    /// Sender domains treated as known customers (additive classifier bonus).
    pub known_customer_domains: BTreeSet<String>,
}

impl FeatureSnapshot {
    pub fn lexicon(&self, category: Category) -> Option<&Lexicon> {
        self.lexicons.get(&category)
    }
}

// ── Feedback log ────────────────────────────────────────────────────

/// A human correction, appended to the audit log and never edited.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub id: Uuid,
    /// The classification result being corrected.
    pub result_id: Uuid,
    pub message_id: String,
    pub corrected_category: Category,
    pub reviewer_note: String,
    /// Revision the corrected result was produced against. Feedback is
    /// always applied to the latest revision; this preserves the audit
    /// trail when the two differ.
    pub original_revision: u64,
    pub applied_at: DateTime<Utc>,
}

// ── Store ───────────────────────────────────────────────────────────

struct StoreInner {
    revisions: Vec<Arc<FeatureSnapshot>>,
    feedback_log: Vec<FeedbackRecord>,
}

/// Revisioned feature store. See module docs for the concurrency model.
pub struct FeatureStore {
    inner: RwLock<StoreInner>,
}

impl FeatureStore {
    /// Create a store whose revision 0 is the given snapshot content.
    pub fn new(initial: FeatureSnapshot) -> Self {
        let snapshot = FeatureSnapshot {
            revision: 0,
            ..initial
        };
        Self {
            inner: RwLock::new(StoreInner {
                revisions: vec![Arc::new(snapshot)],
                feedback_log: Vec::new(),
            }),
        }
    }

    /// Create a store seeded with the default category lexicons and an
    /// empty taxonomy/customer list.
    pub fn with_defaults() -> Self {
        Self::new(FeatureSnapshot {
            revision: 0,
            lexicons: default_lexicons(),
            taxonomy: Vec::new(),
            known_customer_domains: BTreeSet::new(),
        })
    }

    /// Latest published snapshot.
    pub fn latest(&self) -> Arc<FeatureSnapshot> {
        let inner = self.inner.read().unwrap();
        // Invariant: at least one revision always exists.
        Arc::clone(inner.revisions.last().unwrap())
    }

    pub fn latest_revision(&self) -> u64 {
        self.latest().revision
    }

    /// Fetch a specific revision, for reproducing historical runs.
    pub fn snapshot(&self, revision: u64) -> Result<Arc<FeatureSnapshot>, StoreError> {
        let inner = self.inner.read().unwrap();
        inner
            .revisions
            .get(revision as usize)
            .map(Arc::clone)
            .ok_or(StoreError::RevisionNotFound {
                revision,
                latest: inner.revisions.len() as u64 - 1,
            })
    }

    /// Publish a new revision derived from the latest one. The build
    /// closure runs under the write lock, so writes are serialized and
    /// readers only ever see fully-published revisions.
    pub fn publish(
        &self,
        build: impl FnOnce(&FeatureSnapshot) -> FeatureSnapshot,
    ) -> Arc<FeatureSnapshot> {
        let mut inner = self.inner.write().unwrap();
        let latest = Arc::clone(inner.revisions.last().unwrap());
        let next = Arc::new(FeatureSnapshot {
            revision: latest.revision + 1,
            ..build(&latest)
        });
        inner.revisions.push(Arc::clone(&next));
        info!(revision = next.revision, "Published feature store revision");
        next
    }

    /// Append a feedback record to the audit log. Append-only; records
    /// are never edited or deleted.
    pub fn append_feedback(&self, record: FeedbackRecord) {
        let mut inner = self.inner.write().unwrap();
        inner.feedback_log.push(record);
    }

    /// Copy of the feedback audit log, oldest first.
    pub fn feedback_log(&self) -> Vec<FeedbackRecord> {
        self.inner.read().unwrap().feedback_log.clone()
    }

    /// Replace the product taxonomy wholesale (catalog refresh).
    /// Returns the new revision.
    pub fn replace_taxonomy(&self, entries: Vec<TaxonomyEntry>) -> u64 {
        self.publish(|latest| FeatureSnapshot {
            taxonomy: entries,
            ..latest.clone()
        })
        .revision
    }

    /// Add a sender domain to the known-customer list. Returns the new revision.
    pub fn add_known_customer_domain(&self, domain: &str) -> u64 {
        let domain = domain.to_lowercase();
        self.publish(|latest| {
            let mut domains = latest.known_customer_domains.clone();
            domains.insert(domain.clone());
            FeatureSnapshot {
                known_customer_domains: domains,
                ..latest.clone()
            }
        })
        .revision
    }
}

// ── Default lexicons ────────────────────────────────────────────────

/// Seeded term weights for the rule-based scorer. `needs_review` carries
/// no terms: it is only ever assigned by the tie-break and low-signal
/// rules, never scored into.
pub fn default_lexicons() -> BTreeMap<Category, Lexicon> {
    let mut lexicons = BTreeMap::new();

    let lead: Lexicon = [
        ("pricing", 2.0),
        ("quote", 2.0),
        ("purchase", 2.0),
        ("demo", 1.5),
        ("interested in", 1.5),
        ("looking for", 1.5),
        ("buy", 1.0),
        ("enterprise", 1.0),
        ("trial", 1.0),
        ("need", 0.5),
    ]
    .into_iter()
    .map(|(t, w)| (t.to_string(), LexiconEntry::weighted(w)))
    .collect();
    lexicons.insert(Category::NewCustomerLead, lead);

    let existing: Lexicon = [
        ("my account", 2.0),
        ("my order", 2.0),
        ("support ticket", 1.5),
        ("renewal", 1.5),
        ("invoice", 1.0),
        ("subscription", 1.0),
        ("login", 1.0),
        ("password", 1.0),
    ]
    .into_iter()
    .map(|(t, w)| (t.to_string(), LexiconEntry::weighted(w)))
    .collect();
    lexicons.insert(Category::ExistingCustomerInquiry, existing);

    let mut info: Lexicon = [
        ("support hours", 2.0),
        ("question", 1.5),
        ("what are", 1.0),
        ("how do", 1.0),
        ("wondering", 1.0),
        ("learn more", 1.0),
        ("information", 0.5),
    ]
    .into_iter()
    .map(|(t, w)| (t.to_string(), LexiconEntry::weighted(w)))
    .collect();
    // Question marks are a repeat-sensitive signal: each one counts.
    info.insert(
        "?".to_string(),
        LexiconEntry {
            weight: 0.5,
            repeat_sensitive: true,
        },
    );
    lexicons.insert(Category::InformationRequest, info);

    let spam: Lexicon = [
        ("unsubscribe", 2.5),
        ("lottery", 2.5),
        ("winner", 2.0),
        ("limited time offer", 2.0),
        ("act now", 1.5),
        ("click here", 1.5),
        ("100% free", 2.0),
    ]
    .into_iter()
    .map(|(t, w)| (t.to_string(), LexiconEntry::weighted(w)))
    .collect();
    lexicons.insert(Category::NotRelevant, spam);

    lexicons.insert(Category::NeedsReview, Lexicon::new());

    lexicons
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_revision_is_zero() {
        let store = FeatureStore::with_defaults();
        assert_eq!(store.latest_revision(), 0);
    }

    #[test]
    fn publish_increments_revision() {
        let store = FeatureStore::with_defaults();
        let rev = store.replace_taxonomy(vec![TaxonomyEntry::new("routers", &["router"])]);
        assert_eq!(rev, 1);
        assert_eq!(store.latest_revision(), 1);
    }

    #[test]
    fn prior_revisions_remain_inspectable() {
        let store = FeatureStore::with_defaults();
        store.replace_taxonomy(vec![TaxonomyEntry::new("routers", &["router"])]);

        let old = store.snapshot(0).unwrap();
        assert!(old.taxonomy.is_empty());
        let new = store.snapshot(1).unwrap();
        assert_eq!(new.taxonomy.len(), 1);
    }

    #[test]
    fn unknown_revision_is_an_error() {
        let store = FeatureStore::with_defaults();
        let err = store.snapshot(42).unwrap_err();
        assert!(matches!(
            err,
            StoreError::RevisionNotFound {
                revision: 42,
                latest: 0
            }
        ));
    }

    #[test]
    fn pinned_snapshot_unaffected_by_later_writes() {
        let store = FeatureStore::with_defaults();
        let pinned = store.latest();
        store.add_known_customer_domain("customer.com");
        assert!(pinned.known_customer_domains.is_empty());
        assert!(store.latest().known_customer_domains.contains("customer.com"));
    }

    #[test]
    fn taxonomy_aliases_are_lowercased() {
        let entry = TaxonomyEntry::new("Routers", &["Router", "ROUTERS"]);
        assert!(entry.aliases.contains("router"));
        assert!(entry.aliases.contains("routers"));
    }

    #[test]
    fn default_lexicons_cover_every_category() {
        let lexicons = default_lexicons();
        for cat in Category::ALL {
            assert!(lexicons.contains_key(&cat), "missing {}", cat.label());
        }
        assert!(lexicons[&Category::NeedsReview].is_empty());
    }

    #[test]
    fn feedback_log_appends_in_order() {
        let store = FeatureStore::with_defaults();
        for n in 0..3 {
            store.append_feedback(FeedbackRecord {
                id: Uuid::new_v4(),
                result_id: Uuid::new_v4(),
                message_id: format!("m-{n}"),
                corrected_category: Category::InformationRequest,
                reviewer_note: String::new(),
                original_revision: 0,
                applied_at: Utc::now(),
            });
        }
        let log = store.feedback_log();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].message_id, "m-0");
        assert_eq!(log[2].message_id, "m-2");
    }
}
