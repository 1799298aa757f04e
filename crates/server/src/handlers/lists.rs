//! The list-names endpoint.

use crate::state::AppState;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

pub async fn list_names(State(state): State<AppState>) -> Response {
    let mut body = state.registry().base_names().join("\n");
    body.push('\n');
    ([(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
