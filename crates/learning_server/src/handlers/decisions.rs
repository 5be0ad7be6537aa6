//! GET /events/decisions: cursor-paginated decision event feed.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Extension, Json,
};
use learning_core::{DecisionFeed, DecisionPage, FeedQuery, LearningError};

use crate::correlation::CorrelationId;
use crate::error::{AppError, WithCorrelation};
use crate::requests::DecisionFeedParams;
use crate::state::AppState;

pub async fn list_decisions(
    State(state): State<AppState>,
    Extension(cid): Extension<CorrelationId>,
    params: Result<Query<DecisionFeedParams>, QueryRejection>,
) -> Result<Json<DecisionPage>, AppError> {
    let Query(params) = params
        .map_err(|rejection| LearningError::invalid("query", rejection.body_text()))
        .with_correlation(&cid)?;

    let query = FeedQuery::from_params(
        params.types.as_deref(),
        params.after.as_deref(),
        params.limit.as_deref(),
    )
    .with_correlation(&cid)?;

    let page = DecisionFeed::new(state.decisions.as_ref())
        .page(&query)
        .await
        .with_correlation(&cid)?;
    Ok(Json(page))
}
