//! Admin API for runtime access log control.
//!
//! All routes sit behind bearer-token authentication.

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::accesslog::AccessLogManager;

use self::auth::admin_auth_middleware;
use self::handlers::*;

/// Shared state of the admin router.
#[derive(Clone)]
pub struct AdminState {
    pub manager: Arc<AccessLogManager>,
    pub api_key: Arc<str>,
}

impl AdminState {
    pub fn new(manager: Arc<AccessLogManager>, api_key: &str) -> Self {
        Self {
            manager,
            api_key: Arc::from(api_key),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/accesslogs", get(get_access_logs))
        .route("/admin/accesslogs/toggle", post(toggle_access_log))
        .route("/admin/accesslogs/disable_all", post(disable_all_access_logs))
        .route("/admin/variables", get(get_variables))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            admin_auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
