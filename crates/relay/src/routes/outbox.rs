//! Operational view of the outbox.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use outbox::{OutboxStoreExt, PendingEntry};

use crate::AppState;
use crate::error::ApiError;

/// Entries returned by the pending endpoint.
pub const PENDING_LIMIT: usize = 50;

/// GET /api/outbox/pending: the oldest unpublished entries.
pub async fn pending(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<PendingEntry>>, ApiError> {
    let summary = state.outbox.pending_summary(PENDING_LIMIT).await?;
    Ok(Json(summary))
}
