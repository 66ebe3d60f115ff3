use axum::{routing::delete, routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health/", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/auth/login/", get(handlers::login_form).post(handlers::login))
        .route("/auth/signup/", post(handlers::signup))
        .route("/auth/account/", delete(handlers::delete_account))
}

pub fn admin() -> Router<AppState> {
    Router::new()
        .route("/admin/groups/", post(handlers::create_group))
        .route("/admin/groups/:slug/", delete(handlers::delete_group))
}

pub fn feed() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::index))
        .route("/group/:slug/", get(handlers::group_posts))
        .route("/follow/", get(handlers::follow_index))
}

/// Author-scoped routes. Static segments (`/new/`, `/follow/`, `/auth/…`)
/// take priority over `:username`, so those names cannot be profiles.
pub fn posts() -> Router<AppState> {
    Router::new()
        .route(
            "/new/",
            get(handlers::new_post_form).post(handlers::create_post),
        )
        .route("/:username/", get(handlers::profile))
        .route("/:username/follow/", get(handlers::profile_follow))
        .route("/:username/unfollow/", get(handlers::profile_unfollow))
        .route("/:username/:post_id/", get(handlers::post_view))
        .route(
            "/:username/:post_id/edit/",
            get(handlers::post_edit_form).post(handlers::post_edit),
        )
        .route("/:username/:post_id/delete/", post(handlers::post_delete))
        .route("/:username/:post_id/comment/", post(handlers::add_comment))
}
