pub mod media;
pub mod offers;
pub mod reviews;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// The whole HTTP surface: JSON API under `/api`, uploaded media under `/static`.
pub fn app(state: AppState) -> Router {
    let body_limit = state.body_limit();

    let api = Router::new()
        .merge(offers::router())
        .merge(reviews::router())
        .merge(users::router());

    Router::new()
        .nest("/api", api)
        .route("/static/{*path}", get(media::serve))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback() -> AppError {
    AppError::not_found("Route not found")
}

/// Parse a numeric path id, rejecting anything else with 400.
pub(crate) fn parse_id(raw: &str, what: &str) -> AppResult<i64> {
    raw.parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::BadRequest(format!("Invalid {what} id")))
}
