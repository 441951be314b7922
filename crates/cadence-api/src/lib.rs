//! Cadence API - REST surface
//!
//! This crate provides the operator-facing REST API: campaign admission
//! and lifecycle commands, schedule preview, message retry and the
//! dispatcher trigger endpoint.

pub mod handlers;
pub mod openapi;
pub mod routes;

use cadence_core::{CampaignManager, Dispatcher};
use cadence_storage::DatabasePool;
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    pub db_pool: DatabasePool,
    pub manager: CampaignManager,
    pub dispatcher: Arc<Dispatcher>,
}

pub use routes::create_router;
