//! Postgres implementations of the learning_core port traits.
//!
//! Each adapter is a newtype wrapping PgPool. All SQL is runtime-checked
//! (sqlx::query, not sqlx::query!) to avoid compile-time DB requirement.

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use learning_core::error::{LearningError, Result};
use learning_core::feed::{Cursor, DecisionEventType, PlanCreatedRow, PlanReviewRow};
use learning_core::ports::{DecisionSource, InsertOutcome, LearningEventStore};
use learning_core::types::LearningEvent;

use crate::rows::{PgLearningEventRow, PgPlanReviewRow, PgPlanRow};

// ── PgLearningEventStore ──────────────────────────────────────

/// Postgres-backed learning event store. Uniqueness on `inputs_hash` is
/// enforced by the `learning_events_inputs_hash_key` constraint.
pub struct PgLearningEventStore {
    pool: PgPool,
}

impl PgLearningEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const INSERT_EVENT: &str = r#"
    INSERT INTO learning_events (
        id, agent_id, agent_version, decision_type, source_id,
        inputs_hash, outputs, confidence, constraints_applied, created_at
    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
"#;

fn bind_event<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    event: &'q LearningEvent,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(event.id)
        .bind(&event.agent_id)
        .bind(&event.agent_version)
        .bind(event.decision_type.as_ref())
        .bind(event.source_id.as_deref())
        .bind(&event.inputs_hash)
        .bind(&event.outputs)
        .bind(event.confidence)
        .bind(&event.constraints_applied)
        .bind(event.created_at)
}

#[async_trait]
impl LearningEventStore for PgLearningEventStore {
    async fn insert_ignore_conflict(&self, event: &LearningEvent) -> Result<bool> {
        let sql = format!("{INSERT_EVENT} ON CONFLICT (inputs_hash) DO NOTHING");
        let result = bind_event(sqlx::query(&sql), event)
            .execute(&self.pool)
            .await
            .context("failed to insert learning event")?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert(&self, event: &LearningEvent) -> Result<InsertOutcome> {
        match bind_event(sqlx::query(INSERT_EVENT), event)
            .execute(&self.pool)
            .await
        {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Ok(InsertOutcome::DuplicateFingerprint)
            }
            Err(e) => Err(anyhow!(e).context("failed to insert learning event").into()),
        }
    }

    async fn find_id_by_inputs_hash(&self, inputs_hash: &str) -> Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM learning_events
            WHERE inputs_hash = $1
            "#,
        )
        .bind(inputs_hash)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up learning event by inputs_hash")?;
        Ok(id)
    }

    async fn count_by_inputs_hash(&self, inputs_hash: &str) -> Result<u64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM learning_events
            WHERE inputs_hash = $1
            "#,
        )
        .bind(inputs_hash)
        .fetch_one(&self.pool)
        .await
        .context("failed to count learning events")?;
        Ok(count.max(0) as u64)
    }

    async fn load(&self, id: Uuid) -> Result<Option<LearningEvent>> {
        let row = sqlx::query_as::<_, PgLearningEventRow>(
            r#"
            SELECT id, agent_id, agent_version, decision_type, source_id,
                   inputs_hash, outputs, confidence, constraints_applied, created_at
            FROM learning_events
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to load learning event")?;
        row.map(|r| {
            r.try_into()
                .map_err(|e: String| LearningError::Internal(anyhow!(e)))
        })
        .transpose()
    }
}

// ── PgDecisionSource ──────────────────────────────────────────

/// Reads the `plans` and `plan_reviews` relations for the decision feed.
///
/// The sort key is computed in SQL exactly as the core computes it: the
/// creation time floored to milliseconds, then the composite event id under
/// the "C" collation so string order is byte order. Truncating before the
/// epoch extraction keeps the millisecond key exact where `EXTRACT` returns
/// double precision (Postgres 13 and earlier).
pub struct PgDecisionSource {
    pool: PgPool,
}

impl PgDecisionSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn cursor_binds(after: Option<&Cursor>) -> (Option<i64>, Option<String>) {
    match after {
        Some(c) => (Some(c.timestamp_ms), Some(c.event_id())),
        None => (None, None),
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[async_trait]
impl DecisionSource for PgDecisionSource {
    async fn plans_created_after(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanCreatedRow>> {
        let (after_ms, after_id) = cursor_binds(after);
        let rows = sqlx::query_as::<_, PgPlanRow>(
            r#"
            WITH stamped AS (
                SELECT id, objective, recommendation, confidence, reward, created_at,
                       (EXTRACT(EPOCH FROM date_trunc('milliseconds', created_at))::NUMERIC * 1000)::BIGINT
                           AS ts_ms
                FROM plans
            ), keyed AS (
                SELECT *,
                       ('plan_created:' || id || ':' || ts_ms::TEXT) COLLATE "C" AS event_id
                FROM stamped
            )
            SELECT id, objective, recommendation, confidence, reward, created_at
            FROM keyed
            WHERE $1::BIGINT IS NULL
               OR ts_ms > $1
               OR (ts_ms = $1 AND event_id > $2::TEXT)
            ORDER BY ts_ms, event_id
            LIMIT $3
            "#,
        )
        .bind(after_ms)
        .bind(after_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to query plan creations")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn plan_reviews_after(
        &self,
        outcomes: &[DecisionEventType],
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanReviewRow>> {
        let (after_ms, after_id) = cursor_binds(after);
        let outcomes: Vec<String> = outcomes.iter().map(|t| t.to_string()).collect();
        let rows = sqlx::query_as::<_, PgPlanReviewRow>(
            r#"
            WITH stamped AS (
                SELECT r.id, r.plan_id, r.approved, r.reviewer, r.reviewer_role, r.notes,
                       p.objective AS plan_objective, r.created_at,
                       (EXTRACT(EPOCH FROM date_trunc('milliseconds', r.created_at))::NUMERIC * 1000)::BIGINT
                           AS ts_ms,
                       CASE
                           WHEN r.approved IS NULL THEN 'plan_deferred'
                           WHEN r.approved THEN 'plan_approved'
                           ELSE 'plan_rejected'
                       END AS event_type
                FROM plan_reviews r
                LEFT JOIN plans p ON p.id = r.plan_id
            ), keyed AS (
                SELECT *,
                       (event_type || ':' || id || ':' || ts_ms::TEXT) COLLATE "C" AS event_id
                FROM stamped
            )
            SELECT id, plan_id, approved, reviewer, reviewer_role, notes, plan_objective, created_at
            FROM keyed
            WHERE event_type = ANY($1)
              AND ($2::BIGINT IS NULL
                   OR ts_ms > $2
                   OR (ts_ms = $2 AND event_id > $3::TEXT))
            ORDER BY ts_ms, event_id
            LIMIT $4
            "#,
        )
        .bind(outcomes)
        .bind(after_ms)
        .bind(after_id)
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await
        .context("failed to query plan reviews")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn plan_exists(&self, plan_id: &str) -> Result<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS (SELECT 1 FROM plans WHERE id = $1)"#,
        )
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to look up plan")?;
        Ok(exists)
    }
}
