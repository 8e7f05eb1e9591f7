mod handlers;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::kv::KeyValueStore;
use crate::slack::{Authenticator, Dispatcher};

/// Path Slack is configured to call.
pub const SLASH_COMMAND_PATH: &str = "/slack/api";

/// Shared by every request. Nothing in here is mutated while serving.
#[derive(Clone)]
pub struct AppState {
    pub store: KeyValueStore,
    pub authenticator: Authenticator,
    pub dispatcher: Arc<Dispatcher>,
}

impl AppState {
    pub fn new(store: KeyValueStore, authenticator: Authenticator, dispatcher: Dispatcher) -> Self {
        Self {
            store,
            authenticator,
            dispatcher: Arc::new(dispatcher),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(
            SLASH_COMMAND_PATH,
            get(handlers::reject_get).post(handlers::slash_command),
        )
        .route("/version", get(handlers::version))
        .route("/health", get(handlers::health))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}
