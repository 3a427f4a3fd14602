//! HTTP gateway
//!
//! Everything viewers touch over HTTP: the chunked FLV live relay, the
//! heartbeat signal, viewer statistics and the archive listing. The
//! segmented (HLS) tree and archive files themselves are plain files served
//! by a separate static-file collaborator.

pub mod api;
pub mod play;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;

use crate::archive::ArchiveSink;
use crate::config::StreamKeyPolicy;
use crate::relay::RelayHub;
use crate::stats::ViewerStats;

/// Shared state behind the gateway routes
#[derive(Clone)]
pub struct GatewayState {
    pub hub: Arc<RelayHub>,
    pub viewers: Arc<ViewerStats>,
    pub sink: Arc<dyn ArchiveSink>,
    pub policy: StreamKeyPolicy,
}

/// Build the gateway router
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/live/:stream", get(play::serve_flv))
        .route("/api/heartbeat", get(api::heartbeat).post(api::heartbeat))
        .route("/api/stats", get(api::stats))
        .route("/api/archives", get(api::archives))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::archive::MemoryArchiveSink;

    use super::*;

    #[test]
    fn test_router_builds() {
        let state = GatewayState {
            hub: Arc::new(RelayHub::new(16)),
            viewers: Arc::new(ViewerStats::new(Duration::from_secs(15), 1, 20)),
            sink: MemoryArchiveSink::new(),
            policy: StreamKeyPolicy::Verbatim,
        };
        let _router = router(state);
    }
}
