use axum::{
    Json,
    extract::{Path, State},
};

use crate::{AppState, error::AppError};

use super::model::InvalidateCardResponse;

/// Post-mutation hook: drops cached `card.byId` results for one card.
/// Placeholder ids are accepted and reported as `invalidated: false`.
#[axum::debug_handler]
pub async fn invalidate(
    State(state): State<AppState>,
    Path(card_public_id): Path<String>,
) -> Result<Json<InvalidateCardResponse>, AppError> {
    let invalidated = state
        .invalidator
        .invalidate_card(state.query_cache.as_ref(), &card_public_id)
        .await?;

    Ok(Json(InvalidateCardResponse {
        card_public_id,
        invalidated,
    }))
}
