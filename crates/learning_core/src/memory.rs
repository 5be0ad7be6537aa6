//! In-memory implementation of both storage ports.
//!
//! Mirrors the Postgres adapter's semantics (unique fingerprint, strict cursor
//! predicate, `(timestamp_ms, id)` ordering) so handlers and the feed can be
//! exercised without a database.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;
use crate::feed::{event_id, Cursor, DecisionEventType, PlanCreatedRow, PlanReviewRow};
use crate::ports::{DecisionSource, InsertOutcome, LearningEventStore};
use crate::types::LearningEvent;

#[derive(Default)]
pub struct MemoryStore {
    /// Keyed by `inputs_hash`.
    events: RwLock<BTreeMap<String, LearningEvent>>,
    plans: RwLock<Vec<PlanCreatedRow>>,
    reviews: RwLock<Vec<PlanReviewRow>>,
    hide_next_lookup: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_plan(&self, row: PlanCreatedRow) {
        self.plans.write().await.push(row);
    }

    pub async fn add_review(&self, row: PlanReviewRow) {
        self.reviews.write().await.push(row);
    }

    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Make the next fingerprint lookup report "not found", as if it ran
    /// before a concurrent writer committed.
    pub fn hide_next_lookup(&self) {
        self.hide_next_lookup.store(true, Ordering::SeqCst);
    }
}

fn page_after<T>(
    mut rows: Vec<(i64, String, T)>,
    after: Option<&Cursor>,
    limit: usize,
) -> Vec<T> {
    rows.retain(|(ts, id, _)| after.map_or(true, |c| c.is_before(*ts, id)));
    rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
    rows.into_iter().take(limit).map(|(_, _, row)| row).collect()
}

#[async_trait]
impl LearningEventStore for MemoryStore {
    async fn insert_ignore_conflict(&self, event: &LearningEvent) -> Result<bool> {
        let mut events = self.events.write().await;
        if events.contains_key(&event.inputs_hash) {
            return Ok(false);
        }
        events.insert(event.inputs_hash.clone(), event.clone());
        Ok(true)
    }

    async fn insert(&self, event: &LearningEvent) -> Result<InsertOutcome> {
        if self.insert_ignore_conflict(event).await? {
            Ok(InsertOutcome::Inserted)
        } else {
            Ok(InsertOutcome::DuplicateFingerprint)
        }
    }

    async fn find_id_by_inputs_hash(&self, inputs_hash: &str) -> Result<Option<Uuid>> {
        if self.hide_next_lookup.swap(false, Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(self.events.read().await.get(inputs_hash).map(|e| e.id))
    }

    async fn count_by_inputs_hash(&self, inputs_hash: &str) -> Result<u64> {
        Ok(u64::from(self.events.read().await.contains_key(inputs_hash)))
    }

    async fn load(&self, id: Uuid) -> Result<Option<LearningEvent>> {
        Ok(self
            .events
            .read()
            .await
            .values()
            .find(|e| e.id == id)
            .cloned())
    }
}

#[async_trait]
impl DecisionSource for MemoryStore {
    async fn plans_created_after(
        &self,
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanCreatedRow>> {
        let keyed = self
            .plans
            .read()
            .await
            .iter()
            .map(|row| {
                let ts = row.created_at.timestamp_millis();
                (ts, event_id(DecisionEventType::PlanCreated, &row.id, ts), row.clone())
            })
            .collect();
        Ok(page_after(keyed, after, limit))
    }

    async fn plan_reviews_after(
        &self,
        outcomes: &[DecisionEventType],
        after: Option<&Cursor>,
        limit: usize,
    ) -> Result<Vec<PlanReviewRow>> {
        let plans = self.plans.read().await;
        let keyed = self
            .reviews
            .read()
            .await
            .iter()
            .filter(|row| outcomes.contains(&row.event_type()))
            .map(|row| {
                let ts = row.created_at.timestamp_millis();
                let mut row = row.clone();
                if row.plan_objective.is_none() {
                    row.plan_objective = plans
                        .iter()
                        .find(|p| p.id == row.plan_id)
                        .map(|p| p.objective.clone());
                }
                (ts, event_id(row.event_type(), &row.id, ts), row)
            })
            .collect();
        Ok(page_after(keyed, after, limit))
    }

    async fn plan_exists(&self, plan_id: &str) -> Result<bool> {
        Ok(self.plans.read().await.iter().any(|p| p.id == plan_id))
    }
}
