//! Signal normalization: turns raw human review input into bounded numeric signals.
//!
//! Two variants share the same output shape (signal(s), summary, confidence):
//! - approval: a boolean verdict with an optional dampening/boost adjustment
//! - feedback: free text, optionally with structured per-dimension ratings
//!
//! Everything here is pure; no I/O.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Words that push keyword sentiment up by one step each.
pub const POSITIVE_KEYWORDS: [&str; 10] = [
    "good",
    "great",
    "excellent",
    "helpful",
    "clear",
    "accurate",
    "correct",
    "useful",
    "perfect",
    "love",
];

/// Words that push keyword sentiment down by one step each.
pub const NEGATIVE_KEYWORDS: [&str; 10] = [
    "bad",
    "poor",
    "wrong",
    "unclear",
    "confusing",
    "incorrect",
    "missing",
    "incomplete",
    "useless",
    "hate",
];

pub const KEYWORD_STEP: f64 = 0.2;
pub const STRUCTURED_CONFIDENCE: f64 = 1.0;
pub const KEYWORD_CONFIDENCE: f64 = 0.6;

const SOURCE_FOUND_BONUS: f64 = 0.10;
const REVIEWER_ROLE_BONUS: f64 = 0.05;

fn clamp_unit(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

// ── Approval ──────────────────────────────────────────────────

/// Map an approve/reject verdict onto [-1, 1].
///
/// `adjustment` scales the base signal by `(1 + adjustment)`, so `-1.0`
/// fully dampens the verdict and anything that overshoots is clamped.
pub fn normalize_approval_signal(approved: bool, adjustment: Option<f64>) -> f64 {
    let base = if approved { 1.0 } else { -1.0 };
    match adjustment {
        Some(adj) => clamp_unit(base * (1.0 + adj)),
        None => base,
    }
}

/// Confidence for an approval signal: its magnitude plus context bonuses.
pub fn approval_confidence(signal: f64, source_found: bool, reviewer_role_known: bool) -> f64 {
    let mut confidence = signal.abs().min(1.0);
    if source_found {
        confidence = (confidence + SOURCE_FOUND_BONUS).min(1.0);
    }
    if reviewer_role_known {
        confidence = (confidence + REVIEWER_ROLE_BONUS).min(1.0);
    }
    confidence
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApprovalInput {
    pub approved: bool,
    pub confidence_adjustment: Option<f64>,
}

/// Context flags gathered by the caller before normalizing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApprovalContext {
    pub source_found: bool,
    pub reviewer_role_known: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApprovalSignal {
    pub signal: f64,
    pub confidence: f64,
    pub summary: String,
}

impl ApprovalInput {
    pub fn normalize(&self, ctx: &ApprovalContext) -> ApprovalSignal {
        let signal = normalize_approval_signal(self.approved, self.confidence_adjustment);
        let confidence = approval_confidence(signal, ctx.source_found, ctx.reviewer_role_known);
        let verdict = if self.approved { "approved" } else { "rejected" };
        ApprovalSignal {
            signal,
            confidence,
            summary: format!("reviewer {verdict} (signal {signal:+.2})"),
        }
    }
}

// ── Feedback ──────────────────────────────────────────────────

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Dimension {
    Quality,
    Clarity,
    Accuracy,
    Completeness,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DimensionSignal {
    pub dimension: Dimension,
    pub value: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NormalizationMethod {
    Structured,
    KeywordSentiment,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackSignals {
    pub signals: Vec<DimensionSignal>,
    /// Derived keyword sentiment; `None` when structured ratings were used.
    pub sentiment: Option<f64>,
    pub confidence: f64,
    pub method: NormalizationMethod,
    pub summary: String,
}

/// Base sentiment for a feedback category tag. Unlisted tags are neutral.
pub fn base_sentiment(category: &str) -> f64 {
    match category {
        "approval" => 0.8,
        "rejection" => -0.8,
        "suggestion" => 0.3,
        "critique" => -0.3,
        "rating" => 0.0,
        _ => 0.0,
    }
}

/// Count distinct positive and negative keywords present as whole words.
pub fn keyword_counts(text: &str) -> (usize, usize) {
    let lowered = text.to_lowercase();
    let words: HashSet<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let positive = POSITIVE_KEYWORDS.iter().filter(|k| words.contains(*k)).count();
    let negative = NEGATIVE_KEYWORDS.iter().filter(|k| words.contains(*k)).count();
    (positive, negative)
}

/// Keyword sentiment: category base plus the keyword balance, clamped.
pub fn keyword_sentiment(text: &str, category: Option<&str>) -> f64 {
    let base = category.map(base_sentiment).unwrap_or(0.0);
    let (positive, negative) = keyword_counts(text);
    let balance = positive as f64 - negative as f64;
    clamp_unit(base + balance * KEYWORD_STEP)
}

#[derive(Debug, Clone, Copy)]
pub struct FeedbackInput<'a> {
    pub text: &'a str,
    pub category: Option<&'a str>,
    pub ratings: Option<&'a BTreeMap<Dimension, f64>>,
}

impl FeedbackInput<'_> {
    pub fn normalize(&self) -> FeedbackSignals {
        match self.ratings.filter(|r| !r.is_empty()) {
            Some(ratings) => {
                let signals: Vec<_> = ratings
                    .iter()
                    .map(|(dimension, value)| DimensionSignal {
                        dimension: *dimension,
                        value: clamp_unit(*value),
                        confidence: STRUCTURED_CONFIDENCE,
                    })
                    .collect();
                FeedbackSignals {
                    summary: format!("{} structured rating(s)", signals.len()),
                    signals,
                    sentiment: None,
                    confidence: STRUCTURED_CONFIDENCE,
                    method: NormalizationMethod::Structured,
                }
            }
            None => {
                let sentiment = keyword_sentiment(self.text, self.category);
                let signals = Dimension::iter()
                    .map(|dimension| DimensionSignal {
                        dimension,
                        value: sentiment,
                        confidence: KEYWORD_CONFIDENCE,
                    })
                    .collect();
                FeedbackSignals {
                    signals,
                    sentiment: Some(sentiment),
                    confidence: KEYWORD_CONFIDENCE,
                    method: NormalizationMethod::KeywordSentiment,
                    summary: format!("keyword sentiment {sentiment:+.2}"),
                }
            }
        }
    }
}
