use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use projections::{ListingSearchDocument, SearchIndex};

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

/// GET /api/search/documents/{id}: the projected search document.
#[tracing::instrument(skip(state))]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ListingSearchDocument>, ApiError> {
    let id = parse_id(&id)?;

    state
        .index
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Search document {id} not found")))
}
