//! Router and shared request state.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{PasswordHasher, SessionStore};
use crate::settings::AuthSettings;
use crate::store::Store;
use crate::vision::Predictor;

pub mod handlers;
pub mod pages;

/// Services injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: SessionStore,
    pub predictor: Arc<Predictor>,
    pub hasher: PasswordHasher,
    pub cookie_name: Arc<str>,
}

impl AppState {
    pub fn new(store: Store, predictor: Arc<Predictor>, auth: &AuthSettings) -> Self {
        Self {
            store,
            sessions: SessionStore::new(Duration::from_secs(auth.login_ttl_secs)),
            predictor,
            hasher: PasswordHasher::new(auth.password_iterations),
            cookie_name: Arc::from(auth.cookie_name.as_str()),
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/register", get(handlers::register_page).post(handlers::register))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/predict", post(handlers::predict))
        .route("/history", get(handlers::history))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}
