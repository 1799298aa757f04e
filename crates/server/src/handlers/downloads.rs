//! The downloads endpoint: catch clients up on the lists they follow.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bouncer_core::{parse_downloads, DownloadsResponse};
use serde::Deserialize;
use tracing::warn;

/// Query parameters shared by the protocol endpoints.
#[derive(Debug, Deserialize)]
pub struct ProtocolParams {
    /// Protocol version, e.g. "2.0".
    pub pver: Option<String>,
    /// Client application version, used for versioned list resolution.
    pub appver: Option<String>,
}

impl ProtocolParams {
    fn protocol_version(&self) -> ApiResult<f64> {
        let raw = self.pver.as_deref().unwrap_or("2.0");
        raw.parse().map_err(|_| {
            ApiError::BadRequest(format!("invalid protocol version \"{raw}\""))
        })
    }
}

pub async fn downloads(
    State(state): State<AppState>,
    Query(params): Query<ProtocolParams>,
    body: String,
) -> ApiResult<Response> {
    // MAC tokens were a pre-3.0 protocol feature; newer clients must not
    // send them.
    let mac_allowed = params.protocol_version()? < 3.0;
    let parsed = parse_downloads(&body, mac_allowed).map_err(ApiError::Core)?;

    let registry = state.registry();
    let mut updates = Vec::with_capacity(parsed.claims.len());
    for claim in &parsed.claims {
        let Some(list) = registry.resolve(&claim.name, params.appver.as_deref()) else {
            warn!(list = %claim.name, "unknown list reported; ignoring");
            continue;
        };
        if let Some(update) = list.build_update(&claim.name, claim).await? {
            updates.push(update);
        }
    }

    let response = DownloadsResponse {
        interval_secs: registry.interval_secs(),
        updates,
    };
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        response.to_bytes(),
    )
        .into_response())
}
