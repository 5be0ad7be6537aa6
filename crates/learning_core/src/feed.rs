//! Decision feed: one ordered, cursor-paginated stream over two append-only sources.
//!
//! Plan creations and plan reviews live in separate relations that grow
//! independently. Each page is produced by:
//!
//! 1. querying every enabled family with a strict `(timestamp_ms, id) > cursor`
//!    predicate, ascending, limited to the page size
//! 2. mapping rows to [`DecisionEvent`] (id = `type:rowId:millis`)
//! 3. merging all batches by `(timestamp_ms, id)` and truncating to the page size
//!
//! Over-fetching a full page per family is enough: a page can never need more
//! than `limit` rows from any single family. The last id on the page is the
//! next cursor. Given immutable rows with non-decreasing timestamps, polling
//! with that cursor never repeats or skips a row.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{FieldError, LearningError, Result};
use crate::ports::DecisionSource;

pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const MAX_PAGE_SIZE: usize = 1000;

const CURSOR_SEPARATOR: char = ':';

// ── Event types ───────────────────────────────────────────────

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
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DecisionEventType {
    PlanCreated,
    PlanApproved,
    PlanRejected,
    PlanDeferred,
}

/// Source relation an event type is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFamily {
    Creation,
    Review,
}

impl DecisionEventType {
    pub fn family(self) -> EventFamily {
        match self {
            Self::PlanCreated => EventFamily::Creation,
            Self::PlanApproved | Self::PlanRejected | Self::PlanDeferred => EventFamily::Review,
        }
    }

    /// `approved = NULL` on a review row means the reviewer deferred.
    pub fn from_review_outcome(approved: Option<bool>) -> Self {
        match approved {
            Some(true) => Self::PlanApproved,
            Some(false) => Self::PlanRejected,
            None => Self::PlanDeferred,
        }
    }
}

// ── Source rows ───────────────────────────────────────────────

/// A row of the plan-creation relation.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanCreatedRow {
    pub id: String,
    pub objective: String,
    pub recommendation: Option<String>,
    pub confidence: Option<f64>,
    pub reward: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// A row of the plan-review relation. References exactly one creation row.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReviewRow {
    pub id: String,
    pub plan_id: String,
    pub approved: Option<bool>,
    pub reviewer: Option<String>,
    pub reviewer_role: Option<String>,
    pub notes: Option<String>,
    pub plan_objective: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PlanReviewRow {
    pub fn event_type(&self) -> DecisionEventType {
        DecisionEventType::from_review_outcome(self.approved)
    }
}

// ── Events ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanCreatedPayload {
    pub plan_id: String,
    pub objective: String,
    pub recommendation: Option<String>,
    pub confidence: Option<f64>,
    pub reward: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlanReviewPayload {
    pub review_id: String,
    pub plan_id: String,
    pub objective: Option<String>,
    pub approved: Option<bool>,
    pub reviewer: Option<String>,
    pub reviewer_role: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum DecisionEventKind {
    PlanCreated(PlanCreatedPayload),
    PlanApproved(PlanReviewPayload),
    PlanRejected(PlanReviewPayload),
    PlanDeferred(PlanReviewPayload),
}

impl DecisionEventKind {
    pub fn event_type(&self) -> DecisionEventType {
        match self {
            Self::PlanCreated(_) => DecisionEventType::PlanCreated,
            Self::PlanApproved(_) => DecisionEventType::PlanApproved,
            Self::PlanRejected(_) => DecisionEventType::PlanRejected,
            Self::PlanDeferred(_) => DecisionEventType::PlanDeferred,
        }
    }
}

/// Read-side projection of a plan lifecycle transition. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionEvent {
    pub id: String,
    #[serde(flatten)]
    pub kind: DecisionEventKind,
    pub timestamp: DateTime<Utc>,
}

impl DecisionEvent {
    pub fn event_type(&self) -> DecisionEventType {
        self.kind.event_type()
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }

    /// Total order used for merging and paging.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        self.timestamp_ms()
            .cmp(&other.timestamp_ms())
            .then_with(|| self.id.as_str().cmp(other.id.as_str()))
    }
}

/// Composite event id; also the wire form of a [`Cursor`].
pub fn event_id(event_type: DecisionEventType, row_id: &str, timestamp_ms: i64) -> String {
    format!("{event_type}{CURSOR_SEPARATOR}{row_id}{CURSOR_SEPARATOR}{timestamp_ms}")
}

fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

impl From<PlanCreatedRow> for DecisionEvent {
    fn from(row: PlanCreatedRow) -> Self {
        let ts_ms = row.created_at.timestamp_millis();
        Self {
            id: event_id(DecisionEventType::PlanCreated, &row.id, ts_ms),
            timestamp: truncate_to_millis(row.created_at),
            kind: DecisionEventKind::PlanCreated(PlanCreatedPayload {
                plan_id: row.id,
                objective: row.objective,
                recommendation: row.recommendation,
                confidence: row.confidence,
                reward: row.reward,
            }),
        }
    }
}

impl From<PlanReviewRow> for DecisionEvent {
    fn from(row: PlanReviewRow) -> Self {
        let event_type = row.event_type();
        let ts_ms = row.created_at.timestamp_millis();
        let id = event_id(event_type, &row.id, ts_ms);
        let timestamp = truncate_to_millis(row.created_at);
        let payload = PlanReviewPayload {
            review_id: row.id,
            plan_id: row.plan_id,
            objective: row.plan_objective,
            approved: row.approved,
            reviewer: row.reviewer,
            reviewer_role: row.reviewer_role,
            notes: row.notes,
        };
        let kind = match event_type {
            DecisionEventType::PlanApproved => DecisionEventKind::PlanApproved(payload),
            DecisionEventType::PlanRejected => DecisionEventKind::PlanRejected(payload),
            _ => DecisionEventKind::PlanDeferred(payload),
        };
        Self {
            id,
            kind,
            timestamp,
        }
    }
}

// ── Cursor ────────────────────────────────────────────────────

/// Position of the last event a consumer has seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub event_type: DecisionEventType,
    pub row_id: String,
    pub timestamp_ms: i64,
}

impl Cursor {
    /// Parse `type:rowId:millis`. Row ids may themselves contain `:`, so the
    /// first and last segments are split off and the middle is re-joined.
    /// Anything malformed yields `None` and the feed starts from the beginning.
    pub fn parse(raw: &str) -> Option<Self> {
        let segments: Vec<&str> = raw.split(CURSOR_SEPARATOR).collect();
        if segments.len() < 3 {
            return None;
        }
        let event_type = DecisionEventType::from_str(segments[0]).ok()?;
        let timestamp_ms = segments[segments.len() - 1].parse::<i64>().ok()?;
        let row_id = segments[1..segments.len() - 1].join(":");
        Some(Self {
            event_type,
            row_id,
            timestamp_ms,
        })
    }

    pub fn event_id(&self) -> String {
        event_id(self.event_type, &self.row_id, self.timestamp_ms)
    }

    /// True when an event keyed `(timestamp_ms, event_id)` sorts strictly after this cursor.
    pub fn is_before(&self, timestamp_ms: i64, event_id: &str) -> bool {
        match timestamp_ms.cmp(&self.timestamp_ms) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => event_id > self.event_id().as_str(),
        }
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.event_id())
    }
}

// ── Query ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    pub types: BTreeSet<DecisionEventType>,
    pub after: Option<Cursor>,
    pub limit: usize,
}

impl Default for FeedQuery {
    fn default() -> Self {
        Self {
            types: DecisionEventType::iter().collect(),
            after: None,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl FeedQuery {
    /// Build a query from raw query-string values.
    ///
    /// Unknown type names and non-numeric limits are validation errors.
    /// Out-of-range limits are clamped; a malformed cursor is dropped.
    pub fn from_params(
        types: Option<&str>,
        after: Option<&str>,
        limit: Option<&str>,
    ) -> Result<Self> {
        let mut problems = Vec::new();

        let mut requested = BTreeSet::new();
        for name in types.unwrap_or_default().split(',') {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            match DecisionEventType::from_str(name) {
                Ok(t) => {
                    requested.insert(t);
                }
                Err(_) => problems.push(FieldError::new(
                    "types",
                    format!("unknown decision event type '{name}'"),
                )),
            }
        }
        if requested.is_empty() {
            requested = DecisionEventType::iter().collect();
        }

        let limit = match limit.map(str::trim).filter(|l| !l.is_empty()) {
            None => DEFAULT_PAGE_SIZE,
            Some(raw) => match raw.parse::<i64>() {
                Ok(n) => clamp_limit(n),
                Err(_) => {
                    problems.push(FieldError::new("limit", "must be an integer"));
                    DEFAULT_PAGE_SIZE
                }
            },
        };

        if !problems.is_empty() {
            return Err(LearningError::Validation(problems));
        }

        let after = after.filter(|raw| !raw.is_empty()).and_then(|raw| {
            let parsed = Cursor::parse(raw);
            if parsed.is_none() {
                tracing::debug!(cursor = raw, "ignoring malformed cursor");
            }
            parsed
        });

        Ok(Self {
            types: requested,
            after,
            limit,
        })
    }

    pub fn includes_creation(&self) -> bool {
        self.types.contains(&DecisionEventType::PlanCreated)
    }

    /// Requested review outcomes; empty when the review family is disabled.
    pub fn review_types(&self) -> Vec<DecisionEventType> {
        self.types
            .iter()
            .copied()
            .filter(|t| t.family() == EventFamily::Review)
            .collect()
    }
}

pub fn clamp_limit(requested: i64) -> usize {
    requested.clamp(1, MAX_PAGE_SIZE as i64) as usize
}

// ── Merge ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionPage {
    pub events: Vec<DecisionEvent>,
    pub next_cursor: Option<String>,
}

/// Fan in per-family batches into one page ordered by `(timestamp_ms, id)`.
pub fn merge_page<I>(batches: I, limit: usize) -> DecisionPage
where
    I: IntoIterator<Item = Vec<DecisionEvent>>,
{
    let mut events: Vec<DecisionEvent> = batches.into_iter().flatten().collect();
    events.sort_by(DecisionEvent::cmp_key);
    events.truncate(limit);
    let next_cursor = events.last().map(|e| e.id.clone());
    DecisionPage {
        events,
        next_cursor,
    }
}

/// Produces pages of the decision feed from a [`DecisionSource`].
pub struct DecisionFeed<'a> {
    source: &'a dyn DecisionSource,
}

impl<'a> DecisionFeed<'a> {
    pub fn new(source: &'a dyn DecisionSource) -> Self {
        Self { source }
    }

    /// Fetch one page. Any source failure aborts the whole page.
    pub async fn page(&self, query: &FeedQuery) -> Result<DecisionPage> {
        let mut batches: Vec<Vec<DecisionEvent>> = Vec::with_capacity(2);

        if query.includes_creation() {
            let rows = self
                .source
                .plans_created_after(query.after.as_ref(), query.limit)
                .await?;
            batches.push(rows.into_iter().map(DecisionEvent::from).collect());
        }

        let review_types = query.review_types();
        if !review_types.is_empty() {
            let rows = self
                .source
                .plan_reviews_after(&review_types, query.after.as_ref(), query.limit)
                .await?;
            batches.push(
                rows.into_iter()
                    .filter(|r| review_types.contains(&r.event_type()))
                    .map(DecisionEvent::from)
                    .collect(),
            );
        }

        let page = merge_page(batches, query.limit);
        tracing::debug!(
            events = page.events.len(),
            next_cursor = page.next_cursor.as_deref().unwrap_or("-"),
            "decision feed page"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    fn created(id: &str, ms: i64) -> PlanCreatedRow {
        PlanCreatedRow {
            id: id.into(),
            objective: format!("objective {id}"),
            recommendation: None,
            confidence: Some(0.8),
            reward: None,
            created_at: at(ms),
        }
    }

    fn review(id: &str, plan_id: &str, approved: Option<bool>, ms: i64) -> PlanReviewRow {
        PlanReviewRow {
            id: id.into(),
            plan_id: plan_id.into(),
            approved,
            reviewer: Some("dana".into()),
            reviewer_role: None,
            notes: None,
            plan_objective: None,
            created_at: at(ms),
        }
    }

    // ── Cursor ───────────────────────────────────────────────

    #[test]
    fn cursor_parses_simple_id() {
        let c = Cursor::parse("plan_created:p-1:1700000000000").unwrap();
        assert_eq!(c.event_type, DecisionEventType::PlanCreated);
        assert_eq!(c.row_id, "p-1");
        assert_eq!(c.timestamp_ms, 1_700_000_000_000);
    }

    #[test]
    fn cursor_row_id_may_contain_separator() {
        let raw = "plan_rejected:urn:review:42:1700000000123";
        let c = Cursor::parse(raw).unwrap();
        assert_eq!(c.row_id, "urn:review:42");
        assert_eq!(c.to_string(), raw);
    }

    #[test]
    fn malformed_cursors_are_rejected() {
        assert_eq!(Cursor::parse("garbage"), None);
        assert_eq!(Cursor::parse("plan_created:1700000000000"), None);
        assert_eq!(Cursor::parse("plan_created:p-1:yesterday"), None);
        assert_eq!(Cursor::parse("plan_exploded:p-1:1700000000000"), None);
        assert_eq!(Cursor::parse(""), None);
    }

    #[test]
    fn cursor_predicate_is_strict() {
        let c = Cursor::parse("plan_created:b:100").unwrap();
        assert!(!c.is_before(100, "plan_created:b:100"));
        assert!(!c.is_before(100, "plan_created:a:100"));
        assert!(c.is_before(100, "plan_created:c:100"));
        assert!(c.is_before(101, "plan_approved:a:101"));
        assert!(!c.is_before(99, "plan_rejected:z:99"));
    }

    // ── Mapping ──────────────────────────────────────────────

    #[test]
    fn rows_map_to_composite_ids() {
        let e = DecisionEvent::from(created("p-1", 1_000));
        assert_eq!(e.id, "plan_created:p-1:1000");
        assert_eq!(e.event_type(), DecisionEventType::PlanCreated);

        let e = DecisionEvent::from(review("r-1", "p-1", Some(true), 2_000));
        assert_eq!(e.id, "plan_approved:r-1:2000");
        let e = DecisionEvent::from(review("r-2", "p-1", Some(false), 2_000));
        assert_eq!(e.event_type(), DecisionEventType::PlanRejected);
        let e = DecisionEvent::from(review("r-3", "p-1", None, 2_000));
        assert_eq!(e.event_type(), DecisionEventType::PlanDeferred);
    }

    #[test]
    fn timestamps_truncate_to_millis() {
        let mut row = created("p-1", 0);
        row.created_at = Utc.timestamp_opt(1, 123_456_789).unwrap();
        let e = DecisionEvent::from(row);
        assert_eq!(e.id, "plan_created:p-1:1123");
        assert_eq!(e.timestamp, at(1_123));
    }

    #[test]
    fn event_serializes_with_type_and_payload() {
        let e = DecisionEvent::from(review("r-1", "p-1", Some(false), 5));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["id"], "plan_rejected:r-1:5");
        assert_eq!(json["type"], "plan_rejected");
        assert_eq!(json["payload"]["plan_id"], "p-1");
        assert_eq!(json["payload"]["approved"], false);
        assert!(json["timestamp"].is_string());
    }

    // ── Merge ────────────────────────────────────────────────

    #[test]
    fn merge_orders_across_families_and_truncates() {
        let creations: Vec<DecisionEvent> = vec![created("p-1", 10), created("p-2", 30)]
            .into_iter()
            .map(Into::into)
            .collect();
        let reviews: Vec<DecisionEvent> = vec![
            review("r-1", "p-1", Some(true), 20),
            review("r-2", "p-2", Some(false), 40),
        ]
        .into_iter()
        .map(Into::into)
        .collect();

        let page = merge_page(vec![creations, reviews], 3);
        let ids: Vec<_> = page.events.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "plan_created:p-1:10",
                "plan_approved:r-1:20",
                "plan_created:p-2:30"
            ]
        );
        assert_eq!(page.next_cursor.as_deref(), Some("plan_created:p-2:30"));
    }

    #[test]
    fn equal_timestamps_break_ties_on_id() {
        let page = merge_page(
            vec![
                vec![DecisionEvent::from(created("p-1", 10))],
                vec![DecisionEvent::from(review("r-1", "p-1", Some(true), 10))],
            ],
            10,
        );
        assert_eq!(page.events[0].id, "plan_approved:r-1:10");
        assert_eq!(page.events[1].id, "plan_created:p-1:10");
    }

    #[test]
    fn empty_page_has_no_cursor() {
        let page = merge_page(Vec::<Vec<DecisionEvent>>::new(), 10);
        assert!(page.events.is_empty());
        assert_eq!(page.next_cursor, None);
    }

    // ── Query parsing ────────────────────────────────────────

    #[test]
    fn query_defaults() {
        let q = FeedQuery::from_params(None, None, None).unwrap();
        assert_eq!(q, FeedQuery::default());
        assert_eq!(q.types.len(), 4);
    }

    #[test]
    fn query_clamps_limit() {
        assert_eq!(FeedQuery::from_params(None, None, Some("0")).unwrap().limit, 1);
        assert_eq!(FeedQuery::from_params(None, None, Some("-5")).unwrap().limit, 1);
        assert_eq!(
            FeedQuery::from_params(None, None, Some("5000")).unwrap().limit,
            MAX_PAGE_SIZE
        );
        assert_eq!(FeedQuery::from_params(None, None, Some("25")).unwrap().limit, 25);
    }

    #[test]
    fn query_rejects_unknown_types_and_bad_limits() {
        let err = FeedQuery::from_params(Some("plan_created,plan_exploded"), None, Some("ten"))
            .unwrap_err();
        match err {
            LearningError::Validation(problems) => {
                let paths: Vec<_> = problems.iter().map(|p| p.path.as_str()).collect();
                assert_eq!(paths, vec!["types", "limit"]);
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn query_splits_families() {
        let q = FeedQuery::from_params(Some(" plan_approved , plan_deferred "), None, None).unwrap();
        assert!(!q.includes_creation());
        assert_eq!(
            q.review_types(),
            vec![DecisionEventType::PlanApproved, DecisionEventType::PlanDeferred]
        );
    }

    #[test]
    fn query_drops_malformed_cursor() {
        let q = FeedQuery::from_params(None, Some("garbage"), None).unwrap();
        assert_eq!(q.after, None);
    }
}
