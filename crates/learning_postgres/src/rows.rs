//! sqlx row types and their conversions into core types.

use chrono::{DateTime, Utc};
use std::str::FromStr;
use uuid::Uuid;

use learning_core::feed::{PlanCreatedRow, PlanReviewRow};
use learning_core::types::{LearningDecisionType, LearningEvent};

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgLearningEventRow {
    pub id: Uuid,
    pub agent_id: String,
    pub agent_version: String,
    pub decision_type: String,
    pub source_id: Option<String>,
    pub inputs_hash: String,
    pub outputs: serde_json::Value,
    pub confidence: f64,
    pub constraints_applied: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<PgLearningEventRow> for LearningEvent {
    type Error = String;

    fn try_from(r: PgLearningEventRow) -> Result<Self, Self::Error> {
        let decision_type = LearningDecisionType::from_str(&r.decision_type)
            .map_err(|_| format!("unknown decision_type '{}'", r.decision_type))?;
        Ok(Self {
            id: r.id,
            agent_id: r.agent_id,
            agent_version: r.agent_version,
            decision_type,
            source_id: r.source_id,
            inputs_hash: r.inputs_hash,
            outputs: r.outputs,
            confidence: r.confidence,
            constraints_applied: r.constraints_applied,
            created_at: r.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgPlanRow {
    pub id: String,
    pub objective: String,
    pub recommendation: Option<String>,
    pub confidence: Option<f64>,
    pub reward: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl From<PgPlanRow> for PlanCreatedRow {
    fn from(r: PgPlanRow) -> Self {
        Self {
            id: r.id,
            objective: r.objective,
            recommendation: r.recommendation,
            confidence: r.confidence,
            reward: r.reward,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PgPlanReviewRow {
    pub id: String,
    pub plan_id: String,
    pub approved: Option<bool>,
    pub reviewer: Option<String>,
    pub reviewer_role: Option<String>,
    pub notes: Option<String>,
    pub plan_objective: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<PgPlanReviewRow> for PlanReviewRow {
    fn from(r: PgPlanReviewRow) -> Self {
        Self {
            id: r.id,
            plan_id: r.plan_id,
            approved: r.approved,
            reviewer: r.reviewer,
            reviewer_role: r.reviewer_role,
            notes: r.notes,
            plan_objective: r.plan_objective,
            created_at: r.created_at,
        }
    }
}
