// routes.rs
use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post, put},
    Router,
};
use http::{header::CONTENT_TYPE, Method};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers;
use crate::state::AppState;

pub fn create_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/polls", post(handlers::create_poll))
        .route("/vote/{token}", get(handlers::get_poll_for_voter))
        .route("/admin/{token}", get(handlers::get_poll_for_admin))
        .route("/polls/{poll_id}/voters/{voter_id}", get(handlers::has_voted))
        .route("/polls/{poll_id}/votes", post(handlers::cast_vote))
        .route("/polls/{poll_id}/status", put(handlers::update_status))
        .route("/voter-id", post(handlers::new_voter_id));

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .with_state(state)
}
