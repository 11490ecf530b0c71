//! stemchat-server library interface
//!
//! Exposes the router, application state and session engine for the binary
//! and for integration testing.

pub mod api;
pub mod error;
pub mod services;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;

use crate::services::{FileStore, SeparationRunner, SongLookup};
use crate::session::{SessionEngine, SessionSettings};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Inbox/outbox storage shared by uploads, downloads and sessions
    pub store: Arc<FileStore>,
    /// Separation job runner
    pub runner: Arc<dyn SeparationRunner>,
    /// Song catalog client
    pub lookup: Arc<dyn SongLookup>,
    /// Session engine settings
    pub session_settings: SessionSettings,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: Arc<FileStore>,
        runner: Arc<dyn SeparationRunner>,
        lookup: Arc<dyn SongLookup>,
        session_settings: SessionSettings,
    ) -> Self {
        Self {
            store,
            runner,
            lookup,
            session_settings,
            startup_time: Utc::now(),
        }
    }

    /// Engine for one new session
    pub fn session_engine(&self) -> SessionEngine {
        SessionEngine::new(
            Arc::clone(&self.store),
            Arc::clone(&self.runner),
            Arc::clone(&self.lookup),
            self.session_settings.clone(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::ui_routes())
        .merge(api::session_routes())
        .merge(api::file_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
