//! API routes

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{campaigns, dispatch, health, messages};
use crate::{openapi, AppState};

/// Create the API router
pub fn create_router(state: AppState, enable_swagger: bool) -> Router {
    let state = Arc::new(state);

    // Health check routes (no auth required)
    let health_routes = Router::new()
        .route("/", get(health::health))
        .route("/live", get(health::liveness))
        .route("/ready", get(health::readiness))
        .route("/detailed", get(health::health_detailed))
        .with_state(state.clone());

    // Campaign routes
    let campaign_routes = Router::new()
        .route(
            "/",
            get(campaigns::list_campaigns).post(campaigns::create_campaign),
        )
        .route("/preview", post(campaigns::preview_schedule))
        .route("/:id", get(campaigns::get_campaign))
        .route("/:id/stats", get(campaigns::get_campaign_stats))
        .route("/:id/messages", get(messages::list_messages))
        .route("/:id/pause", post(campaigns::pause_campaign))
        .route("/:id/resume", post(campaigns::resume_campaign))
        .route("/:id/cancel", post(campaigns::cancel_campaign));

    // Message routes
    let message_routes = Router::new().route("/:id/retry", post(messages::retry_message));

    // Dispatcher trigger
    let dispatch_routes = Router::new().route("/", post(dispatch::trigger_dispatch));

    let api_v1 = Router::new()
        .nest("/campaigns", campaign_routes)
        .nest("/messages", message_routes)
        .nest("/dispatch", dispatch_routes)
        .with_state(state.clone());

    let mut router = Router::new()
        .nest("/health", health_routes)
        .nest("/api/v1", api_v1);

    if enable_swagger {
        router = router.merge(openapi::create_openapi_routes());
    }

    router.layer(TraceLayer::new_for_http())
}
