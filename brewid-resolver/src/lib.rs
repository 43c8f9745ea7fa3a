//! brewid-resolver library interface
//!
//! Entity resolution and human-in-the-loop disambiguation for brewery and
//! beer labels extracted from bottle photos.

pub mod api;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult, ResolverError, ResolverResult};

use axum::Router;
use brewid_common::events::EventBus;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::services::{ConfirmationWorkflow, MemoryCatalog};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Session workflow (owns the session store)
    pub workflow: Arc<ConfirmationWorkflow>,
    /// Catalog snapshot and persistence target
    pub catalog: Arc<MemoryCatalog>,
    /// Resolver event broadcast, streamed over SSE
    pub event_bus: EventBus,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        workflow: Arc<ConfirmationWorkflow>,
        catalog: Arc<MemoryCatalog>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            workflow,
            catalog,
            event_bus,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::session_routes())
        .merge(api::event_routes())
        .merge(api::health_routes())
        .with_state(state)
}
