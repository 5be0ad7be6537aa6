//! Learning write endpoints.
//!
//! POST /learning/learn       record an approve/reject verdict as an approval signal
//! POST /learning/assimilate  record free-text / rated feedback as dimension signals

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Extension, Json,
};
use learning_core::hash::inputs_hash;
use learning_core::signal::{ApprovalContext, ApprovalInput, FeedbackInput};
use learning_core::{
    LearningDecisionType, LearningError, LearningEvent, LearningEventWriter, WriteOutcome,
};
use serde_json::json;

use crate::correlation::CorrelationId;
use crate::error::{AppError, WithCorrelation};
use crate::requests::*;
use crate::state::AppState;

fn body_error(rejection: JsonRejection) -> LearningError {
    LearningError::invalid("body", rejection.body_text())
}

/// Persist on a detached task so a client disconnect cannot cancel the write.
async fn persist(state: &AppState, event: LearningEvent) -> Result<WriteOutcome, LearningError> {
    let writer = LearningEventWriter::new(state.events.clone());
    tokio::spawn(async move { writer.write(&event).await })
        .await
        .map_err(|e| anyhow::anyhow!("learning event write task failed: {e}"))?
}

pub async fn learn(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    body: Result<Json<LearnRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<LearnResponse>), AppError> {
    let Json(req) = body.map_err(body_error).with_correlation(&cid)?;
    let req = req.validate().with_correlation(&cid)?;

    let decision_id = req.decision_id.as_deref().unwrap_or(DEFAULT_DECISION_ID);
    let reviewer_role = req.reviewer_role.as_deref().unwrap_or(DEFAULT_REVIEWER_ROLE);
    let review_scope = req.review_scope.as_deref().unwrap_or(DEFAULT_REVIEW_SCOPE);
    let artifact_type = req.artifact_type.as_deref().unwrap_or(DEFAULT_ARTIFACT_TYPE);
    let feedback = req.feedback.as_deref().unwrap_or(DEFAULT_FEEDBACK);

    let source_found = match &req.decision_id {
        Some(id) => {
            let found = state.decisions.plan_exists(id).await.with_correlation(&cid)?;
            if !found {
                tracing::warn!(decision_id = %id, "source decision not found, learning without it");
            }
            found
        }
        None => false,
    };

    let input = ApprovalInput {
        approved: req.approved,
        confidence_adjustment: req.confidence_adjustment,
    };
    let signal = input.normalize(&ApprovalContext {
        source_found,
        reviewer_role_known: req.reviewer_role.is_some(),
    });

    // Defaults are part of the fingerprint; the client timestamp is not.
    let inputs = json!({
        "decision_id": decision_id,
        "approved": req.approved,
        "confidence_adjustment": req.confidence_adjustment,
        "reviewer_role": reviewer_role,
        "review_scope": review_scope,
        "artifact_type": artifact_type,
        "feedback": feedback,
    });
    let hash = inputs_hash(&inputs);

    let event = LearningEvent::new(
        &state.agent,
        LearningDecisionType::ApprovalLearning,
        req.decision_id.clone(),
        hash.clone(),
        json!({
            "normalized_signal": signal.signal,
            "summary": signal.summary,
            "processing": {
                "method": "approval_signal",
                "source_found": source_found,
            },
        }),
        signal.confidence,
        json!({
            "reviewer_role": reviewer_role,
            "review_scope": review_scope,
            "artifact_type": artifact_type,
            "source_found": source_found,
            "submitted_at": req.timestamp,
        }),
    );

    let outcome = persist(&state, event).await.with_correlation(&cid)?;

    // Context (source lookup) may have changed since the first submission;
    // report what was stored, not what this call computed.
    let (mut normalized_signal, mut confidence) = (signal.signal, signal.confidence);
    if outcome.deduplicated {
        if let Some(existing) = state.events.load(outcome.id).await.with_correlation(&cid)? {
            confidence = existing.confidence;
            if let Some(stored) = existing.outputs["normalized_signal"].as_f64() {
                normalized_signal = stored;
            }
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(LearnResponse {
            id: outcome.id,
            decision_type: LearningDecisionType::ApprovalLearning.to_string(),
            normalized_signal,
            confidence,
            inputs_hash: hash,
            idempotent: true,
            learning_applied: true,
        }),
    ))
}

pub async fn assimilate(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    body: Result<Json<AssimilateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AssimilateResponse>), AppError> {
    let Json(req) = body.map_err(body_error).with_correlation(&cid)?;
    let ValidAssimilation { request: req, ratings } = req.validate().with_correlation(&cid)?;

    let category = req
        .feedback_category
        .as_deref()
        .unwrap_or(DEFAULT_FEEDBACK_CATEGORY);

    let signals = FeedbackInput {
        text: &req.raw_feedback,
        category: Some(category),
        ratings: Some(&ratings),
    }
    .normalize();

    let signal_inputs = if ratings.is_empty() {
        json!(DEFAULT_FEEDBACK)
    } else {
        json!(ratings)
    };
    let inputs = json!({
        "source_artifact_id": req.source_artifact_id,
        "feedback_type": req.feedback_type,
        "raw_feedback": req.raw_feedback,
        "feedback_category": category,
        "normalized_signals": signal_inputs,
        "feedback_source": req.assimilation_metadata.feedback_source,
        "processing_method": req.assimilation_metadata.processing_method,
    });
    let hash = inputs_hash(&inputs);

    let event = LearningEvent::new(
        &state.agent,
        LearningDecisionType::FeedbackAssimilation,
        Some(req.source_artifact_id.clone()),
        hash,
        json!({
            "signals": signals.signals,
            "sentiment": signals.sentiment,
            "summary": signals.summary,
            "processing": {
                "method": signals.method,
                "processing_method": req.assimilation_metadata.processing_method,
            },
        }),
        signals.confidence,
        json!({
            "feedback_type": req.feedback_type,
            "feedback_category": category,
            "feedback_source": req.assimilation_metadata.feedback_source,
        }),
    );
    let mut timestamp = event.created_at;

    let outcome = persist(&state, event).await.with_correlation(&cid)?;
    if outcome.deduplicated {
        if let Some(existing) = state.events.load(outcome.id).await.with_correlation(&cid)? {
            timestamp = existing.created_at;
        }
    }

    Ok((
        StatusCode::CREATED,
        Json(AssimilateResponse {
            id: outcome.id,
            agent_id: state.agent.agent_id.clone(),
            decision_type: LearningDecisionType::FeedbackAssimilation.to_string(),
            source_artifact_id: req.source_artifact_id,
            feedback_type: req.feedback_type,
            normalized_signals_count: signals.signals.len(),
            created: true,
            timestamp,
        }),
    ))
}
