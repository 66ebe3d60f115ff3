//! Follow Tests
//!
//! Covers following and unfollowing authors and the personalized feed.

mod common;

use axum::http::StatusCode;
use common::app;

async fn followers_count(app: &common::TestApp, username: &str, token: Option<&str>) -> i64 {
    app.get(&format!("/{}/", username), token).await.json()["followers_count"]
        .as_i64()
        .unwrap_or(-1)
}

// ===========================================================================
// Follow / Unfollow
// ===========================================================================

#[tokio::test]
async fn follow_adds_one_follower() {
    let app = app().await;
    app.create_user("author").await;
    let fan = app.create_user("fan").await;
    let before = followers_count(&app, "author", None).await;

    let resp = app.get("/author/follow/", Some(&fan.access_token)).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/author/");
    assert_eq!(followers_count(&app, "author", None).await, before + 1);

    let profile = app.get("/author/", Some(&fan.access_token)).await.json();
    assert_eq!(profile["following"], true);

    let own = app.get("/fan/", None).await.json();
    assert_eq!(own["following_count"], 1);
}

#[tokio::test]
async fn repeated_follow_is_a_no_op() {
    let app = app().await;
    app.create_user("author").await;
    let fan = app.create_user("fan").await;

    app.get("/author/follow/", Some(&fan.access_token)).await;
    let resp = app.get("/author/follow/", Some(&fan.access_token)).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(app.count("follows").await, 1);
}

#[tokio::test]
async fn self_follow_is_a_no_op() {
    let app = app().await;
    let leo = app.create_user("leo").await;

    let resp = app.get("/leo/follow/", Some(&leo.access_token)).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/leo/");
    assert_eq!(app.count("follows").await, 0);
}

#[tokio::test]
async fn unfollow_removes_one_follower() {
    let app = app().await;
    let author = app.create_user("author").await;
    let fan = app.create_user("fan").await;
    app.follow(fan.id, author.id).await;
    let before = followers_count(&app, "author", None).await;
    assert_eq!(before, 1);

    let resp = app.get("/author/unfollow/", Some(&fan.access_token)).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/author/");
    assert_eq!(followers_count(&app, "author", None).await, before - 1);
}

#[tokio::test]
async fn unfollow_without_follow_is_a_no_op() {
    let app = app().await;
    app.create_user("author").await;
    let fan = app.create_user("fan").await;

    let resp = app.get("/author/unfollow/", Some(&fan.access_token)).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(followers_count(&app, "author", None).await, 0);
}

#[tokio::test]
async fn follow_requires_login() {
    let app = app().await;
    app.create_user("author").await;

    let resp = app.get("/author/follow/", None).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/auth/login/?next=%2Fauthor%2Ffollow%2F");
    assert_eq!(app.count("follows").await, 0);
}

#[tokio::test]
async fn follow_unknown_author_is_not_found() {
    let app = app().await;
    let fan = app.create_user("fan").await;

    let resp = app.get("/ghost/follow/", Some(&fan.access_token)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

// ===========================================================================
// Follow Feed
// ===========================================================================

#[tokio::test]
async fn followed_author_post_appears_in_follow_feed() {
    let app = app().await;
    let author = app.create_user("author").await;
    let fan = app.create_user("fan").await;
    let stranger = app.create_user("stranger").await;
    app.follow(fan.id, author.id).await;

    let fan_before = app.get("/follow/", Some(&fan.access_token)).await;
    let stranger_before = app.get("/follow/", Some(&stranger.access_token)).await;
    assert_eq!(fan_before.status, StatusCode::OK);

    app.create_post(author.id, "for my followers", None).await;

    let fan_after = app.get("/follow/", Some(&fan.access_token)).await;
    let stranger_after = app.get("/follow/", Some(&stranger.access_token)).await;

    assert_ne!(fan_before.body(), fan_after.body());
    assert_eq!(fan_after.json()["page"]["items"][0]["text"], "for my followers");
    assert_eq!(stranger_before.body(), stranger_after.body());
    assert_eq!(stranger_after.json()["page"]["count"], 0);
}

#[tokio::test]
async fn follow_feed_holds_only_followed_authors() {
    let app = app().await;
    let followed = app.create_user("followed").await;
    let ignored = app.create_user("ignored").await;
    let fan = app.create_user("fan").await;
    app.follow(fan.id, followed.id).await;
    app.create_post(followed.id, "visible", None).await;
    app.create_post(ignored.id, "hidden", None).await;
    app.create_post(fan.id, "own post", None).await;

    let page = app.get("/follow/", Some(&fan.access_token)).await.json()["page"].clone();

    assert_eq!(page["count"], 1);
    assert_eq!(page["items"][0]["text"], "visible");
}

#[tokio::test]
async fn follow_feed_requires_login() {
    let app = app().await;

    let resp = app.get("/follow/", None).await;

    assert_eq!(resp.status, StatusCode::SEE_OTHER);
    assert_eq!(resp.location(), "/auth/login/?next=%2Ffollow%2F");
}
