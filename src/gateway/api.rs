//! Statistics and heartbeat endpoints

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::Json;

use crate::archive::ArchiveRecord;
use crate::stats::ViewerSnapshot;

use super::GatewayState;

/// `GET|POST /api/heartbeat`: mark the calling viewer as active
///
/// The viewer is identified implicitly by its network address; no body is
/// required and the call always succeeds.
pub async fn heartbeat(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<GatewayState>,
) -> StatusCode {
    state.viewers.record_heartbeat(&addr.ip().to_string());
    StatusCode::OK
}

/// `GET /api/stats`: current viewer count plus the capped count history
///
/// Each call appends one sample to the history buffer.
pub async fn stats(State(state): State<GatewayState>) -> Json<ViewerSnapshot> {
    Json(state.viewers.snapshot())
}

/// `GET /api/archives`: persisted recordings, newest first
pub async fn archives(
    State(state): State<GatewayState>,
) -> Result<Json<Vec<ArchiveRecord>>, StatusCode> {
    match state.sink.list_archives().await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to list archives");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
