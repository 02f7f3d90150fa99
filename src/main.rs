use std::collections::BTreeMap;
use std::sync::Arc;

use mailminer::config::EngineConfig;
use mailminer::message::RawMessage;
use mailminer::pipeline::{Category, Engine};
use mailminer::store::{FeatureStore, TaxonomyEntry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    eprintln!("📬 mailminer v{}", env!("CARGO_PKG_VERSION"));

    let store = Arc::new(FeatureStore::with_defaults());
    store.replace_taxonomy(vec![
        TaxonomyEntry::new("routers", &["router", "routers"]),
        TaxonomyEntry::new("switches", &["switch", "switches", "network switch"]),
        TaxonomyEntry::new("firewalls", &["firewall", "firewalls"]),
    ]);
    store.add_known_customer_domain("customer.example");

    let engine = Engine::new(EngineConfig::default(), Arc::clone(&store));

    let samples = vec![
        RawMessage::plain(
            "demo-1",
            "Pricing for 50 routers",
            "We need enterprise routers for our new office, please send pricing ASAP.\n\nThanks,\nDana Webb",
            "dana@newcorp.example",
        ),
        RawMessage::plain(
            "demo-2",
            "Question about my account",
            "What are your support hours?",
            "pat@customer.example",
        ),
        RawMessage::plain(
            "demo-3",
            "You are a WINNER",
            "Congratulations! Click here to claim your lottery prize. Act now!",
            "promo@spamhouse.example",
        ),
        RawMessage::plain("demo-4", "", "", "mystery@nowhere.example"),
    ];

    let outcomes = engine.process_batch(samples).await;

    let mut distribution: BTreeMap<Category, usize> = BTreeMap::new();
    for outcome in &outcomes {
        *distribution
            .entry(outcome.classification.category)
            .or_default() += 1;
        println!("{}", serde_json::to_string_pretty(outcome)?);
    }

    for (category, count) in distribution {
        tracing::info!(category = category.label(), count, "Category distribution");
    }

    Ok(())
}
