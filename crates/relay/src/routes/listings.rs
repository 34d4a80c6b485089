//! Listing command and read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use listings::{CreateListing, Listing, ListingInput};
use serde::Serialize;

use super::parse_id;
use crate::AppState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct ListingCreatedResponse {
    pub id: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

/// POST /api/listings: create a listing and queue `ListingCreated`.
#[tracing::instrument(skip(state, payload))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateListing>, JsonRejection>,
) -> Result<(StatusCode, Json<ListingCreatedResponse>), ApiError> {
    let listing = state.listings.create(body(payload)?).await?;

    let response = ListingCreatedResponse {
        id: listing.id.to_string(),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// PUT /api/listings/{id}: replace the editable fields and queue `ListingUpdated`.
#[tracing::instrument(skip(state, payload))]
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ListingInput>, JsonRejection>,
) -> Result<Json<Listing>, ApiError> {
    let id = parse_id(&id)?;
    let input = body(payload)?;

    state
        .listings
        .update(id, input)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Listing {id} not found")))
}

/// DELETE /api/listings/{id}: soft-delete and queue `ListingDeleted`.
#[tracing::instrument(skip(state))]
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;

    if state.listings.soft_delete(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Listing {id} not found")))
    }
}

/// GET /api/listings/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Listing>, ApiError> {
    let id = parse_id(&id)?;

    state
        .listings
        .get(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Listing {id} not found")))
}
