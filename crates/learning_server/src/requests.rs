//! Request/response bodies and their validation.
//!
//! serde handles shape (types, required fields); `validate` handles ranges,
//! enumerations and cross-field rules, reporting every problem with its path.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use learning_core::error::{FieldError, LearningError};
use learning_core::signal::Dimension;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_REVIEWER_ROLE: &str = "unknown";
pub const DEFAULT_REVIEW_SCOPE: &str = "general";
pub const DEFAULT_ARTIFACT_TYPE: &str = "plan";
pub const DEFAULT_FEEDBACK: &str = "none";
pub const DEFAULT_DECISION_ID: &str = "none";
pub const DEFAULT_FEEDBACK_CATEGORY: &str = "general";

pub const FEEDBACK_TYPES: [&str; 3] = ["qualitative", "quantitative", "mixed"];

const MAX_TEXT_LEN: usize = 10_000;

fn check_unit_range(problems: &mut Vec<FieldError>, path: String, value: f64) {
    if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
        problems.push(FieldError::new(path, "must be a number within [-1, 1]"));
    }
}

fn check_text(problems: &mut Vec<FieldError>, path: &str, value: &str, required: bool) {
    if value.trim().is_empty() {
        if required {
            problems.push(FieldError::new(path, "must not be empty"));
        } else {
            problems.push(FieldError::new(path, "must not be blank when provided"));
        }
    } else if value.len() > MAX_TEXT_LEN {
        problems.push(FieldError::new(
            path,
            format!("must be at most {MAX_TEXT_LEN} bytes"),
        ));
    }
}

fn finish<T>(value: T, problems: Vec<FieldError>) -> Result<T, LearningError> {
    if problems.is_empty() {
        Ok(value)
    } else {
        Err(LearningError::Validation(problems))
    }
}

// ── POST /learning/learn ──────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LearnRequest {
    pub decision_id: Option<String>,
    pub approved: bool,
    pub confidence_adjustment: Option<f64>,
    pub reviewer_role: Option<String>,
    pub review_scope: Option<String>,
    pub artifact_type: Option<String>,
    pub feedback: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl LearnRequest {
    pub fn validate(self) -> Result<Self, LearningError> {
        let mut problems = Vec::new();
        if let Some(adj) = self.confidence_adjustment {
            check_unit_range(&mut problems, "confidence_adjustment".into(), adj);
        }
        let optional_text = [
            ("decision_id", &self.decision_id),
            ("reviewer_role", &self.reviewer_role),
            ("review_scope", &self.review_scope),
            ("artifact_type", &self.artifact_type),
            ("feedback", &self.feedback),
        ];
        for (path, value) in optional_text {
            if let Some(v) = value {
                check_text(&mut problems, path, v, false);
            }
        }
        finish(self, problems)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LearnResponse {
    pub id: Uuid,
    pub decision_type: String,
    pub normalized_signal: f64,
    pub confidence: f64,
    pub inputs_hash: String,
    pub idempotent: bool,
    pub learning_applied: bool,
}

// ── POST /learning/assimilate ─────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SignalInput {
    pub dimension: String,
    pub value: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssimilationMetadata {
    pub feedback_source: String,
    pub processing_method: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssimilateRequest {
    pub source_artifact_id: String,
    pub feedback_type: String,
    pub raw_feedback: String,
    pub feedback_category: Option<String>,
    pub normalized_signals: Option<Vec<SignalInput>>,
    pub assimilation_metadata: AssimilationMetadata,
}

/// An [`AssimilateRequest`] that passed validation, with ratings keyed by dimension.
#[derive(Debug, Clone)]
pub struct ValidAssimilation {
    pub request: AssimilateRequest,
    pub ratings: BTreeMap<Dimension, f64>,
}

impl AssimilateRequest {
    pub fn validate(self) -> Result<ValidAssimilation, LearningError> {
        let mut problems = Vec::new();

        check_text(&mut problems, "source_artifact_id", &self.source_artifact_id, true);
        check_text(&mut problems, "raw_feedback", &self.raw_feedback, true);
        if !FEEDBACK_TYPES.contains(&self.feedback_type.as_str()) {
            problems.push(FieldError::new(
                "feedback_type",
                format!("must be one of {}", FEEDBACK_TYPES.join(", ")),
            ));
        }
        if let Some(category) = &self.feedback_category {
            check_text(&mut problems, "feedback_category", category, false);
        }
        check_text(
            &mut problems,
            "assimilation_metadata.feedback_source",
            &self.assimilation_metadata.feedback_source,
            true,
        );
        check_text(
            &mut problems,
            "assimilation_metadata.processing_method",
            &self.assimilation_metadata.processing_method,
            true,
        );

        let mut ratings = BTreeMap::new();
        for (i, signal) in self.normalized_signals.iter().flatten().enumerate() {
            let base = format!("normalized_signals[{i}]");
            check_unit_range(&mut problems, format!("{base}.value"), signal.value);
            match Dimension::from_str(&signal.dimension) {
                Ok(dimension) => {
                    if ratings.insert(dimension, signal.value).is_some() {
                        problems.push(FieldError::new(
                            format!("{base}.dimension"),
                            format!("duplicate dimension '{dimension}'"),
                        ));
                    }
                }
                Err(_) => problems.push(FieldError::new(
                    format!("{base}.dimension"),
                    "must be one of quality, clarity, accuracy, completeness",
                )),
            }
        }

        finish(
            ValidAssimilation {
                request: self,
                ratings,
            },
            problems,
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AssimilateResponse {
    pub id: Uuid,
    pub agent_id: String,
    pub decision_type: String,
    pub source_artifact_id: String,
    pub feedback_type: String,
    pub normalized_signals_count: usize,
    pub created: bool,
    pub timestamp: DateTime<Utc>,
}

// ── GET /events/decisions ─────────────────────────────────────

/// Raw query string; parsed into a `FeedQuery` by the core.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionFeedParams {
    pub types: Option<String>,
    pub after: Option<String>,
    pub limit: Option<String>,
}
