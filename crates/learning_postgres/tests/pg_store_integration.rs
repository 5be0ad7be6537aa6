//! Postgres adapter tests against a live database.
//!
//! Run with:
//! DATABASE_URL=postgresql:///learning_test \
//!   cargo test -p learning_postgres --test pg_store_integration -- --ignored

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use learning_core::feed::{Cursor, DecisionEventType, FeedQuery};
use learning_core::ports::{DecisionSource, InsertOutcome, LearningEventStore};
use learning_core::{AgentIdentity, DecisionFeed, LearningDecisionType, LearningEvent};
use learning_core::{LearningEventWriter, WriteStrategy};
use learning_postgres::PgStores;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgresql:///learning_test".to_string());
    let pool = PgPool::connect(&url)
        .await
        .expect("Failed to connect to database");
    learning_postgres::migrate(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

fn agent() -> AgentIdentity {
    AgentIdentity {
        agent_id: "review-learning-agent".into(),
        agent_version: "integration".into(),
    }
}

fn event(decision_type: LearningDecisionType, hash: &str) -> LearningEvent {
    LearningEvent::new(
        &agent(),
        decision_type,
        Some("plan-it".into()),
        hash.to_string(),
        json!({"normalized_signal": 1.0}),
        0.9,
        json!({"review_scope": "general"}),
    )
}

/// Seed plans and reviews with a private time range so other rows never interleave.
async fn seed(pool: &PgPool, prefix: &str, base_ms: i64) {
    for (i, offset) in [0_i64, 2_000, 4_000].iter().enumerate() {
        sqlx::query(
            "INSERT INTO plans (id, objective, recommendation, confidence, created_at) \
             VALUES ($1, $2, 'proceed', 0.7, $3)",
        )
        .bind(format!("{prefix}-p{}", i + 1))
        .bind(format!("objective {}", i + 1))
        .bind(Utc.timestamp_millis_opt(base_ms + offset).unwrap())
        .execute(pool)
        .await
        .unwrap();
    }
    for (i, (approved, offset)) in [(Some(true), 1_000_i64), (Some(false), 3_000)]
        .iter()
        .enumerate()
    {
        sqlx::query(
            "INSERT INTO plan_reviews (id, plan_id, approved, reviewer, created_at) \
             VALUES ($1, $2, $3, 'morgan', $4)",
        )
        .bind(format!("{prefix}-r{}", i + 1))
        .bind(format!("{prefix}-p{}", i + 1))
        .bind(*approved)
        .bind(Utc.timestamp_millis_opt(base_ms + offset).unwrap())
        .execute(pool)
        .await
        .unwrap();
    }
}

async fn cleanup(pool: &PgPool, prefix: &str) {
    let pattern = format!("{prefix}-%");
    sqlx::query("DELETE FROM plan_reviews WHERE id LIKE $1")
        .bind(&pattern)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM plans WHERE id LIKE $1")
        .bind(&pattern)
        .execute(pool)
        .await
        .unwrap();
}

fn unique_base_ms() -> i64 {
    // Far future, spread by a random component so concurrent runs don't overlap.
    let spread = (Uuid::new_v4().as_u128() % 1_000_000) as i64;
    4_000_000_000_000 + spread * 10_000
}

#[tokio::test]
#[ignore]
async fn test_conflicting_insert_is_ignored() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let hash = format!("it-{}", Uuid::new_v4());

    let first = event(LearningDecisionType::ApprovalLearning, &hash);
    let second = event(LearningDecisionType::ApprovalLearning, &hash);
    assert!(stores.events.insert_ignore_conflict(&first).await.unwrap());
    assert!(!stores.events.insert_ignore_conflict(&second).await.unwrap());

    assert_eq!(stores.events.count_by_inputs_hash(&hash).await.unwrap(), 1);
    assert_eq!(
        stores.events.find_id_by_inputs_hash(&hash).await.unwrap(),
        Some(first.id)
    );
}

#[tokio::test]
#[ignore]
async fn test_plain_insert_reports_duplicate_fingerprint() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let hash = format!("it-{}", Uuid::new_v4());

    let first = event(LearningDecisionType::FeedbackAssimilation, &hash);
    assert_eq!(
        stores.events.insert(&first).await.unwrap(),
        InsertOutcome::Inserted
    );
    let again = event(LearningDecisionType::FeedbackAssimilation, &hash);
    assert_eq!(
        stores.events.insert(&again).await.unwrap(),
        InsertOutcome::DuplicateFingerprint
    );

    let loaded = stores.events.load(first.id).await.unwrap().unwrap();
    assert_eq!(loaded.decision_type, LearningDecisionType::FeedbackAssimilation);
    assert_eq!(loaded.inputs_hash, hash);
    assert_eq!(loaded.outputs, first.outputs);
}

#[tokio::test]
#[ignore]
async fn test_concurrent_writers_share_one_row() {
    let pool = pool().await;
    let stores = PgStores::new(pool);
    let store: Arc<dyn LearningEventStore> = Arc::new(stores.events);
    let hash = format!("it-{}", Uuid::new_v4());

    for decision_type in [
        LearningDecisionType::ApprovalLearning,
        LearningDecisionType::FeedbackAssimilation,
    ] {
        let hash = format!("{hash}-{decision_type}");
        assert!(matches!(
            WriteStrategy::for_decision_type(decision_type),
            WriteStrategy::InsertIgnoreConflict | WriteStrategy::CheckThenInsert
        ));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let writer = LearningEventWriter::new(store.clone());
            let ev = event(decision_type, &hash);
            handles.push(tokio::spawn(async move { writer.write(&ev).await }));
        }
        let mut ids = Vec::new();
        for h in handles {
            ids.push(h.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1, "all writers must return the stored id");
        assert_eq!(store.count_by_inputs_hash(&hash).await.unwrap(), 1);
    }
}

#[tokio::test]
#[ignore]
async fn test_feed_pages_through_both_sources() {
    let pool = pool().await;
    let prefix = format!("it{}", Uuid::new_v4().simple());
    let base = unique_base_ms();
    seed(&pool, &prefix, base).await;

    let stores = PgStores::new(pool.clone());
    let feed = DecisionFeed::new(&stores.decisions);

    let mut query = FeedQuery {
        after: Some(Cursor {
            event_type: DecisionEventType::PlanCreated,
            row_id: String::new(),
            timestamp_ms: base - 1,
        }),
        limit: 2,
        ..FeedQuery::default()
    };

    let mut types = Vec::new();
    for _ in 0..3 {
        let page = feed.page(&query).await.unwrap();
        types.extend(page.events.iter().map(|e| e.event_type()));
        query.after = page.next_cursor.as_deref().and_then(Cursor::parse);
    }
    cleanup(&pool, &prefix).await;

    assert_eq!(
        types,
        vec![
            DecisionEventType::PlanCreated,
            DecisionEventType::PlanApproved,
            DecisionEventType::PlanCreated,
            DecisionEventType::PlanRejected,
            DecisionEventType::PlanCreated,
        ]
    );
}

#[tokio::test]
#[ignore]
async fn test_review_rows_carry_plan_objective() {
    let pool = pool().await;
    let prefix = format!("it{}", Uuid::new_v4().simple());
    let base = unique_base_ms();
    seed(&pool, &prefix, base).await;

    let stores = PgStores::new(pool.clone());
    let after = Cursor {
        event_type: DecisionEventType::PlanCreated,
        row_id: String::new(),
        timestamp_ms: base - 1,
    };
    let reviews = stores
        .decisions
        .plan_reviews_after(&[DecisionEventType::PlanApproved], Some(&after), 10)
        .await
        .unwrap();
    let exists = stores
        .decisions
        .plan_exists(&format!("{prefix}-p1"))
        .await
        .unwrap();
    cleanup(&pool, &prefix).await;

    assert!(exists);
    assert_eq!(reviews.len(), 1);
    assert_eq!(reviews[0].plan_objective.as_deref(), Some("objective 1"));
    assert_eq!(reviews[0].approved, Some(true));
}

#[tokio::test]
#[ignore]
async fn test_sub_millisecond_rows_are_not_repeated() {
    let pool = pool().await;
    let prefix = format!("it{}", Uuid::new_v4().simple());
    let base = unique_base_ms();
    let base_ts = Utc.timestamp_millis_opt(base).unwrap();

    for (suffix, at) in [
        ("a", base_ts + chrono::Duration::microseconds(999)),
        ("b", base_ts + chrono::Duration::microseconds(1_001)),
    ] {
        sqlx::query("INSERT INTO plans (id, objective, created_at) VALUES ($1, 'edge', $2)")
            .bind(format!("{prefix}-{suffix}"))
            .bind(at)
            .execute(&pool)
            .await
            .unwrap();
    }

    let stores = PgStores::new(pool.clone());
    let start = Cursor {
        event_type: DecisionEventType::PlanCreated,
        row_id: String::new(),
        timestamp_ms: base - 1,
    };
    let first = stores
        .decisions
        .plans_created_after(Some(&start), 1)
        .await
        .unwrap();
    let after_first = Cursor {
        event_type: DecisionEventType::PlanCreated,
        row_id: first[0].id.clone(),
        timestamp_ms: first[0].created_at.timestamp_millis(),
    };
    let second = stores
        .decisions
        .plans_created_after(Some(&after_first), 10)
        .await
        .unwrap();
    cleanup(&pool, &prefix).await;

    assert_eq!(first[0].id, format!("{prefix}-a"));
    assert_eq!(after_first.timestamp_ms, base);
    let ids: Vec<_> = second.iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![format!("{prefix}-b")]);
}
