//! Group Administration Tests
//!
//! Covers creating and deleting groups with the admin token.

mod common;

use axum::http::StatusCode;
use common::{app, TEST_ADMIN_TOKEN};
use serde_json::json;

#[tokio::test]
async fn admin_creates_group() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({ "title": "Котики", "slug": "cats", "description": "Про котиков" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CREATED);
    assert_eq!(resp.json()["slug"], "cats");

    let feed = app.get("/group/cats/", None).await;
    assert_eq!(feed.status, StatusCode::OK);
    assert_eq!(feed.json()["group"]["title"], "Котики");
}

#[tokio::test]
async fn missing_or_wrong_admin_token_is_forbidden() {
    let app = app().await;
    let body = json!({ "title": "Cats", "slug": "cats", "description": "" });

    let resp = app.post_admin("/admin/groups/", body.clone(), None).await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    let resp = app
        .post_admin("/admin/groups/", body, Some("not-the-token"))
        .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);

    assert_eq!(app.count("post_groups").await, 0);
}

#[tokio::test]
async fn duplicate_slug_conflicts() {
    let app = app().await;
    app.create_group("Cats", "cats").await;

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({ "title": "More cats", "slug": "cats", "description": "" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_group_reports_fields() {
    let app = app().await;

    let resp = app
        .post_admin(
            "/admin/groups/",
            json!({ "title": "x".repeat(201), "slug": "no spaces", "description": "" }),
            Some(TEST_ADMIN_TOKEN),
        )
        .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let errors = resp.json()["errors"].clone();
    assert!(errors["title"].is_array());
    assert!(errors["slug"].is_array());
}

#[tokio::test]
async fn deleting_group_keeps_its_posts() {
    let app = app().await;
    let leo = app.create_user("leo").await;
    let cats = app.create_group("Cats", "cats").await;
    let post_id = app.create_post(leo.id, "meow", Some(cats)).await;

    let resp = app
        .delete_admin("/admin/groups/cats/", Some(TEST_ADMIN_TOKEN))
        .await;

    assert_eq!(resp.status, StatusCode::NO_CONTENT);
    assert_eq!(app.post_text(post_id).await.as_deref(), Some("meow"));
    let group: Option<i64> = sqlx::query_scalar("SELECT group_id FROM posts WHERE id = ?1")
        .bind(post_id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(group, None);
    assert_eq!(
        app.get("/group/cats/", None).await.status,
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn deleting_unknown_group_is_not_found() {
    let app = app().await;

    let resp = app
        .delete_admin("/admin/groups/missing/", Some(TEST_ADMIN_TOKEN))
        .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
