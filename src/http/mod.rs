use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeDir;

use crate::AppState;

mod auth;
mod error;
mod handlers;
mod routes;

pub use auth::{AdminToken, AuthUser};
pub use error::{AppError, LOGIN_URL};

/// Room left in a request body for the non-file fields of a post form.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    let media = ServeDir::new(state.storage.root());
    let body_limit = state.upload_max_bytes + FORM_OVERHEAD_BYTES;

    Router::new()
        .merge(routes::health())
        .merge(routes::auth())
        .merge(routes::admin())
        .merge(routes::feed())
        .merge(routes::posts())
        .nest_service("/media", media)
        .fallback(handlers::page_not_found)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(error::panic_response))
        .with_state(state)
}
