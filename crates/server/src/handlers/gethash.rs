//! The gethash endpoint: expand hash prefixes to full hashes.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bouncer_core::{parse_gethash, GethashResponse};
use bytes::Bytes;

pub async fn gethash(State(state): State<AppState>, body: Bytes) -> ApiResult<Response> {
    let prefixes = parse_gethash(&body).map_err(ApiError::Core)?;

    let found = state.registry().lookup_prefixes(&prefixes);

    let mut matches = Vec::new();
    for (list_name, chunks) in found {
        for (chunk_number, hashes) in chunks {
            matches.push((list_name.clone(), chunk_number, hashes));
        }
    }

    let response = GethashResponse { matches };
    if response.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        response.to_bytes(),
    )
        .into_response())
}
