//! Idempotent append of learning events.
//!
//! Two strategies, one per event kind:
//!
//! - [`WriteStrategy::InsertIgnoreConflict`] (approval learning): a single
//!   `INSERT .. ON CONFLICT (inputs_hash) DO NOTHING`, followed by a lookup of
//!   the stored id when nothing was written.
//! - [`WriteStrategy::CheckThenInsert`] (feedback assimilation): look up by
//!   fingerprint, insert when absent. Two concurrent writers can both miss the
//!   lookup; the loser hits the uniqueness constraint and re-reads the winner's id.
//!
//! Both return the id of the one stored row, so identical submissions always
//! observe the same id.

use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use crate::error::Result;
use crate::ports::{InsertOutcome, LearningEventStore};
use crate::types::{LearningDecisionType, LearningEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    InsertIgnoreConflict,
    CheckThenInsert,
}

impl WriteStrategy {
    pub fn for_decision_type(decision_type: LearningDecisionType) -> Self {
        match decision_type {
            LearningDecisionType::ApprovalLearning => Self::InsertIgnoreConflict,
            LearningDecisionType::FeedbackAssimilation => Self::CheckThenInsert,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub id: Uuid,
    /// `true` when an earlier submission already stored this fingerprint.
    pub deduplicated: bool,
}

pub struct LearningEventWriter {
    store: Arc<dyn LearningEventStore>,
}

impl LearningEventWriter {
    pub fn new(store: Arc<dyn LearningEventStore>) -> Self {
        Self { store }
    }

    /// Persist `event` exactly once per `inputs_hash`, using the strategy
    /// assigned to its decision type.
    pub async fn write(&self, event: &LearningEvent) -> Result<WriteOutcome> {
        let outcome = match WriteStrategy::for_decision_type(event.decision_type) {
            WriteStrategy::InsertIgnoreConflict => self.insert_ignore_conflict(event).await?,
            WriteStrategy::CheckThenInsert => self.check_then_insert(event).await?,
        };
        if outcome.deduplicated {
            tracing::debug!(
                inputs_hash = %event.inputs_hash,
                existing_id = %outcome.id,
                "learning event already stored"
            );
        } else {
            tracing::info!(
                id = %outcome.id,
                decision_type = %event.decision_type,
                "learning event stored"
            );
        }
        Ok(outcome)
    }

    async fn insert_ignore_conflict(&self, event: &LearningEvent) -> Result<WriteOutcome> {
        if self.store.insert_ignore_conflict(event).await? {
            return Ok(WriteOutcome {
                id: event.id,
                deduplicated: false,
            });
        }
        let id = self.existing_id(&event.inputs_hash).await?;
        Ok(WriteOutcome {
            id,
            deduplicated: true,
        })
    }

    async fn check_then_insert(&self, event: &LearningEvent) -> Result<WriteOutcome> {
        if let Some(id) = self.store.find_id_by_inputs_hash(&event.inputs_hash).await? {
            return Ok(WriteOutcome {
                id,
                deduplicated: true,
            });
        }
        match self.store.insert(event).await? {
            InsertOutcome::Inserted => Ok(WriteOutcome {
                id: event.id,
                deduplicated: false,
            }),
            InsertOutcome::DuplicateFingerprint => {
                tracing::debug!(
                    inputs_hash = %event.inputs_hash,
                    "lost insert race on fingerprint, re-reading stored id"
                );
                let id = self.existing_id(&event.inputs_hash).await?;
                Ok(WriteOutcome {
                    id,
                    deduplicated: true,
                })
            }
        }
    }

    async fn existing_id(&self, inputs_hash: &str) -> Result<Uuid> {
        self.store
            .find_id_by_inputs_hash(inputs_hash)
            .await?
            .ok_or_else(|| {
                anyhow!("learning event with inputs_hash {inputs_hash} conflicted but cannot be found")
                    .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::types::AgentIdentity;
    use serde_json::json;

    fn agent() -> AgentIdentity {
        AgentIdentity {
            agent_id: "review-learning-agent".into(),
            agent_version: "test".into(),
        }
    }

    fn event(decision_type: LearningDecisionType, hash: &str) -> LearningEvent {
        LearningEvent::new(
            &agent(),
            decision_type,
            None,
            hash.into(),
            json!({"signal": 1.0}),
            1.0,
            json!({}),
        )
    }

    #[tokio::test]
    async fn approval_duplicates_return_first_id() {
        let store = Arc::new(MemoryStore::new());
        let writer = LearningEventWriter::new(store.clone());

        let first = writer
            .write(&event(LearningDecisionType::ApprovalLearning, "h1"))
            .await
            .unwrap();
        let second = writer
            .write(&event(LearningDecisionType::ApprovalLearning, "h1"))
            .await
            .unwrap();

        assert!(!first.deduplicated);
        assert!(second.deduplicated);
        assert_eq!(first.id, second.id);
        assert_eq!(store.count_by_inputs_hash("h1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn feedback_duplicates_return_first_id() {
        let store = Arc::new(MemoryStore::new());
        let writer = LearningEventWriter::new(store.clone());

        let ids: Vec<Uuid> = {
            let mut ids = Vec::new();
            for _ in 0..3 {
                let out = writer
                    .write(&event(LearningDecisionType::FeedbackAssimilation, "h2"))
                    .await
                    .unwrap();
                ids.push(out.id);
            }
            ids
        };

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(store.count_by_inputs_hash("h2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn lost_race_is_absorbed() {
        let store = Arc::new(MemoryStore::new());
        let winner = event(LearningDecisionType::FeedbackAssimilation, "h3");
        store.insert(&winner).await.unwrap();
        // Simulate a writer whose lookup ran before the winner committed.
        store.hide_next_lookup();

        let writer = LearningEventWriter::new(store.clone());
        let out = writer
            .write(&event(LearningDecisionType::FeedbackAssimilation, "h3"))
            .await
            .unwrap();

        assert_eq!(out.id, winner.id);
        assert!(out.deduplicated);
        assert_eq!(store.count_by_inputs_hash("h3").await.unwrap(), 1);
    }

    #[test]
    fn strategy_per_decision_type() {
        assert_eq!(
            WriteStrategy::for_decision_type(LearningDecisionType::ApprovalLearning),
            WriteStrategy::InsertIgnoreConflict
        );
        assert_eq!(
            WriteStrategy::for_decision_type(LearningDecisionType::FeedbackAssimilation),
            WriteStrategy::CheckThenInsert
        );
    }
}
