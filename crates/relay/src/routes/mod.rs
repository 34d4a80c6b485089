//! HTTP handlers.

pub mod listings;
pub mod ops;
pub mod outbox;
pub mod search;

use common::AggregateId;

use crate::error::ApiError;

fn parse_id(raw: &str) -> Result<AggregateId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid listing id: {raw}")))
}
