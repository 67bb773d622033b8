use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn app(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/dashboard/bookings",
            get(handlers::dashboard::list_bookings),
        )
        .route(
            "/api/dashboard/bookings/:id/status",
            post(handlers::dashboard::update_status),
        )
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            handlers::guard::require_session,
        ));

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/services", get(handlers::catalog::list_services))
        .route("/api/slots", get(handlers::catalog::get_slots))
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/signin", post(handlers::auth::signin))
        .route("/api/auth/signout", post(handlers::auth::signout))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .merge(guarded)
        .fallback(handlers::health::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
