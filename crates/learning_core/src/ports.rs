//! Storage port traits. Adapters (Postgres, in-memory) implement these;
//! core logic operates exclusively through them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::feed::{Cursor, DecisionEventType, PlanCreatedRow, PlanReviewRow};
use crate::types::LearningEvent;

/// Result of a plain insert against the `inputs_hash` uniqueness constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// Another row already holds this fingerprint.
    DuplicateFingerprint,
}

/// Append-only store of learning events, unique on `inputs_hash`.
#[async_trait]
pub trait LearningEventStore: Send + Sync {
    /// Insert, silently doing nothing when the fingerprint already exists.
    /// Returns `true` when a row was written.
    async fn insert_ignore_conflict(&self, event: &LearningEvent) -> Result<bool>;

    /// Insert, reporting a fingerprint collision instead of failing.
    async fn insert(&self, event: &LearningEvent) -> Result<InsertOutcome>;

    async fn find_id_by_inputs_hash(&self, inputs_hash: &str) -> Result<Option<Uuid>>;

    async fn count_by_inputs_hash(&self, inputs_hash: &str) -> Result<u64>;

    async fn load(&self, id: Uuid) -> Result<Option<LearningEvent>>;
}

/// Read access to the two decision source relations.
#[async_trait]
pub trait DecisionSource: Send + Sync {
    /// Creation rows strictly after `after`, ascending by `(timestamp_ms, id)`.
    async fn plans_created_after(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanCreatedRow>>;

    /// Review rows whose outcome is in `outcomes`, strictly after `after`,
    /// ascending by `(timestamp_ms, id)`.
    async fn plan_reviews_after(
        &self,
        outcomes: &[DecisionEventType],
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanReviewRow>>;

    /// Whether a plan with this id exists (context lookup for approvals).
    async fn plan_exists(&self, plan_id: &str) -> Result<bool>;
}
