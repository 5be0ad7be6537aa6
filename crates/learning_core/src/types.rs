use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Kind of learning event written by the write endpoints.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LearningDecisionType {
    ApprovalLearning,
    FeedbackAssimilation,
}

/// Tags identifying the logic that produced an event (not a runtime identity).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentIdentity {
    pub agent_id: String,
    pub agent_version: String,
}

/// Immutable record of one normalized human signal. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningEvent {
    pub id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub decision_type: LearningDecisionType,
    pub source_id: Option<String>,
    pub inputs_hash: String,
    pub outputs: serde_json::Value,
    pub confidence: f64,
    pub constraints_applied: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl LearningEvent {
    /// Build a fresh event with a new id and `created_at = now`.
    pub fn new(
        agent: &AgentIdentity,
        decision_type: LearningDecisionType,
        source_id: Option<String>,
        inputs_hash: String,
        outputs: serde_json::Value,
        confidence: f64,
        constraints_applied: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent.agent_id.clone(),
            agent_version: agent.agent_version.clone(),
            decision_type,
            source_id,
            inputs_hash,
            outputs,
            confidence: confidence.clamp(0.0, 1.0),
            constraints_applied,
            created_at: Utc::now(),
        }
    }
}
