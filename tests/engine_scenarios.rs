//! End-to-end scenarios for the classification & extraction engine:
//! determinism, single-flight idempotence, tie-breaking, confidence
//! bounds, extraction grounding, and feedback monotonicity.

use std::sync::Arc;

use mailminer::config::EngineConfig;
use mailminer::message::RawMessage;
use mailminer::pipeline::types::{MessageStatus, Urgency};
use mailminer::pipeline::{Category, Engine};
use mailminer::store::{FeatureStore, LexiconEntry, TaxonomyEntry};

fn seeded_store() -> Arc<FeatureStore> {
    let store = Arc::new(FeatureStore::with_defaults());
    store.replace_taxonomy(vec![
        TaxonomyEntry::new("routers", &["router", "routers"]),
        TaxonomyEntry::new("switches", &["switch", "switches"]),
    ]);
    store
}

fn engine() -> Engine {
    Engine::new(EngineConfig::default(), seeded_store())
}

// ── Scenario A ──────────────────────────────────────────────────────

#[tokio::test]
async fn new_lead_with_product_and_urgency() {
    let outcome = engine()
        .process(RawMessage::plain(
            "a-1",
            "Pricing for 50 routers",
            "We need enterprise routers for our new office, please send pricing ASAP.",
            "dana@newcorp.example",
        ))
        .await;

    assert_eq!(outcome.classification.category, Category::NewCustomerLead);
    assert_eq!(outcome.status, MessageStatus::ReadyForResponse);

    let extraction = outcome.extraction.expect("extraction should run");
    assert_eq!(extraction.urgency.level, Urgency::High);
    assert!(extraction
        .product_interests
        .iter()
        .any(|p| p.product == "routers"));
    // "please send" is an implicit question.
    assert_eq!(extraction.questions.len(), 1);
}

// ── Scenario B ──────────────────────────────────────────────────────

#[tokio::test]
async fn support_question_is_information_request() {
    let outcome = engine()
        .process(RawMessage::plain(
            "b-1",
            "Question about my account",
            "What are your support hours?",
            "pat@unknown.example",
        ))
        .await;

    assert_eq!(
        outcome.classification.category,
        Category::InformationRequest
    );
    let extraction = outcome.extraction.expect("extraction should run");
    assert!(extraction.product_interests.is_empty());
    assert_eq!(extraction.questions, vec!["What are your support hours?"]);
}

#[tokio::test]
async fn known_customer_domain_flips_to_existing_inquiry() {
    let store = seeded_store();
    store.add_known_customer_domain("customer.example");
    let engine = Engine::new(EngineConfig::default(), store);

    let outcome = engine
        .process(RawMessage::plain(
            "b-2",
            "Question about my account",
            "What are your support hours?",
            "pat@customer.example",
        ))
        .await;

    assert_eq!(
        outcome.classification.category,
        Category::ExistingCustomerInquiry
    );
    assert!(outcome
        .classification
        .matched_terms
        .iter()
        .any(|t| t.term == "sender-domain:customer.example"));
}

// ── Scenario C ──────────────────────────────────────────────────────

#[tokio::test]
async fn empty_message_needs_review_with_empty_extraction() {
    let outcome = engine()
        .process(RawMessage::plain("c-1", "", "", "mystery@nowhere.example"))
        .await;

    assert_eq!(outcome.classification.category, Category::NeedsReview);
    assert_eq!(outcome.classification.confidence, 0.0);
    assert_eq!(outcome.status, MessageStatus::NeedsReview);

    let extraction = outcome.extraction.expect("reviewer still gets context");
    assert!(extraction.contact_info.is_empty());
    assert!(extraction.product_interests.is_empty());
    assert!(extraction.questions.is_empty());
    assert_eq!(extraction.urgency.level, Urgency::Low);
    assert!(extraction.preferred_contact_method.is_none());
}

// ── Scenario D ──────────────────────────────────────────────────────

#[tokio::test]
async fn exactly_tied_scores_never_resolve_to_a_business_category() {
    let store = seeded_store();
    // Give lead and spam equal pull on a crafted message.
    store.publish(|latest| {
        let mut next = latest.clone();
        next.lexicons
            .get_mut(&Category::NewCustomerLead)
            .unwrap()
            .insert("alpha".into(), LexiconEntry::weighted(2.0));
        next.lexicons
            .get_mut(&Category::NotRelevant)
            .unwrap()
            .insert("omega".into(), LexiconEntry::weighted(2.0));
        next
    });
    let engine = Engine::new(EngineConfig::default(), store);

    let outcome = engine
        .process(RawMessage::plain(
            "d-1",
            "hello",
            "alpha omega",
            "x@y.example",
        ))
        .await;

    assert_eq!(outcome.classification.category, Category::NeedsReview);
    assert_eq!(outcome.classification.confidence, 0.0);
    assert_eq!(outcome.status, MessageStatus::NeedsReview);
}

// ── Determinism & idempotence ───────────────────────────────────────

#[tokio::test]
async fn repeated_runs_at_fixed_revision_are_bit_identical_in_content() {
    let engine = engine();
    let msg = RawMessage::plain(
        "det-1",
        "Pricing for routers",
        "Interested in a quote. What is the lead time? Call me on 555-123-4567.",
        "lee@initech.example",
    );
    let revision = engine.store().latest_revision();

    let first = engine.process_at(&msg, revision).unwrap();
    for _ in 0..5 {
        let again = engine.process_at(&msg, revision).unwrap();
        assert!(first.content_eq(&again));
    }
}

#[tokio::test]
async fn concurrent_duplicate_requests_share_one_run() {
    let engine = Arc::new(engine());
    let msg = RawMessage::plain(
        "dup-1",
        "Pricing",
        "Please send a quote for routers.",
        "lee@initech.example",
    );

    let (a, b) = tokio::join!(engine.process(msg.clone()), engine.process(msg.clone()));
    assert!(a.content_eq(&b));
    // Same underlying run, not two independent computations.
    assert_eq!(a.classification.id, b.classification.id);

    // Many overlapping tasks converge on the same outcome too.
    let mut handles = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&engine);
        let msg = msg.clone();
        handles.push(tokio::spawn(async move { engine.process(msg).await }));
    }
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert_eq!(outcome.classification.id, a.classification.id);
    }
}

// ── Confidence bounds ───────────────────────────────────────────────

#[tokio::test]
async fn confidence_always_within_unit_interval() {
    let engine = engine();
    let bodies = [
        "",
        "?????",
        "pricing pricing pricing pricing",
        "unsubscribe lottery winner act now",
        "question about my account and my order and renewal",
        "completely unrelated prose about gardening",
    ];
    for (n, body) in bodies.iter().enumerate() {
        let outcome = engine
            .process(RawMessage::plain(
                &format!("cb-{n}"),
                "mixed",
                body,
                "x@y.example",
            ))
            .await;
        let c = outcome.classification.confidence;
        assert!((0.0..=1.0).contains(&c), "confidence {c} out of bounds");
    }
}

// ── Extraction grounding ────────────────────────────────────────────

#[tokio::test]
async fn every_extracted_field_traces_to_the_message() {
    let subject = "Switches for the warehouse?";
    let body = "Hi, I'm looking for 20 switches. Could you provide lead times?\n\
                We need them by Friday, it's urgent.\n\
                Please call me on +44 20 7946 0958.\n\
                Thanks,\nPriya Patel";
    let msg = RawMessage::plain("g-1", subject, body, "priya@initech.example");

    let outcome = engine().process(msg).await;
    let extraction = outcome.extraction.unwrap();
    let original = format!("{subject}\n{body}");
    let lowered = original.to_lowercase();

    if let Some(name) = &extraction.contact_info.name {
        assert!(original.contains(name));
    }
    if let Some(phone) = &extraction.contact_info.phone {
        assert!(original.contains(phone));
    }
    for question in &extraction.questions {
        assert!(original.contains(question));
    }
    for indicator in &extraction.urgency.indicators {
        assert!(lowered.contains(indicator));
    }
    assert_eq!(extraction.urgency.level, Urgency::High);
    assert_eq!(extraction.contact_info.name.as_deref(), Some("Priya Patel"));
    assert!(extraction
        .product_interests
        .iter()
        .any(|p| p.product == "switches" && p.confidence == 1.0));
}

// ── Feedback monotonicity ───────────────────────────────────────────

#[tokio::test]
async fn feedback_raises_corrected_category_score() {
    let engine = engine();
    let msg = RawMessage::plain(
        "f-1",
        "Please quote pricing",
        "Send a quote for your enterprise trial.",
        "sam@startup.example",
    );

    let before = engine.process(msg.clone()).await;
    assert_eq!(before.classification.category, Category::NewCustomerLead);
    let info_before = before
        .classification
        .score_for(Category::InformationRequest);
    let lead_before = before.classification.score_for(Category::NewCustomerLead);

    let new_revision = engine
        .submit_feedback(
            before.classification.id,
            Category::InformationRequest,
            "research inquiry, not a lead",
        )
        .unwrap();
    assert_eq!(new_revision, engine.store().latest_revision());

    let after = engine.process(msg).await;
    assert_eq!(after.classification.lexicon_revision, new_revision);
    assert!(after.classification.score_for(Category::InformationRequest) >= info_before);
    assert!(after.classification.score_for(Category::NewCustomerLead) < lead_before);

    // The audit trail records the correction against its original revision.
    let log = engine.store().feedback_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].original_revision, before.classification.lexicon_revision);
    assert_eq!(log[0].corrected_category, Category::InformationRequest);
}

#[tokio::test]
async fn historical_revision_still_reproduces_old_result() {
    let engine = engine();
    let msg = RawMessage::plain(
        "h-1",
        "Please quote pricing",
        "Send a quote for your enterprise trial.",
        "sam@startup.example",
    );

    let before = engine.process(msg.clone()).await;
    let old_revision = before.classification.lexicon_revision;
    engine
        .submit_feedback(
            before.classification.id,
            Category::InformationRequest,
            "not a lead",
        )
        .unwrap();

    // Pinning the old revision reproduces the superseded scores exactly.
    let replay = engine.process_at(&msg, old_revision).unwrap();
    assert!(replay.classification.content_eq(&before.classification));
}
