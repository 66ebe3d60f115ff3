use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::app::auth::AuthService;
use crate::app::comments::CommentService;
use crate::app::feed::{FeedScope, FeedService};
use crate::app::forms::{
    self, CommentForm, FieldSpec, FormErrors, FormRejection, GroupForm, LoginForm, PostForm,
    PostFormSpec, SignupForm, UploadedImage,
};
use crate::app::groups::GroupService;
use crate::app::pagination::Page;
use crate::app::posts::PostService;
use crate::app::social::SocialService;
use crate::app::users::UserService;
use crate::domain::comment::Comment;
use crate::domain::group::Group;
use crate::domain::post::Post;
use crate::domain::user::User;
use crate::http::{AdminToken, AppError, AuthUser};
use crate::infra::db::is_unique_violation;
use crate::AppState;

/// Uploaded post images live under this directory of the media root.
const POST_UPLOAD_DIR: &str = "posts";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<String>,
}

fn post_url(username: &str, post_id: i64) -> String {
    format!("/{}/{}/", username, post_id)
}

fn profile_url(username: &str) -> String {
    format!("/{}/", username)
}

/// Post ids in paths are plain digit runs; `+1` or `-1` never name a post.
fn parse_post_id(raw: &str) -> Result<i64, AppError> {
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::not_found("post not found"));
    }
    raw.parse::<i64>()
        .map_err(|_| AppError::not_found("post not found"))
}

fn json_bytes(body: Bytes) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn form_rejection(err: FormRejection, context: &'static str) -> AppError {
    match err {
        FormRejection::Invalid(errors) => AppError::invalid_form(errors),
        FormRejection::Failed(err) => {
            tracing::error!(error = ?err, "{}", context);
            AppError::internal(context)
        }
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

pub async fn page_not_found(uri: Uri) -> AppError {
    AppError::page_not_found(uri.path())
}

// ---------------------------------------------------------------------------
// Feeds
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct IndexResponse {
    pub page: Page<Post>,
}

/// Global timeline. Rendered pages are served from the page cache while
/// fresh.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let cache_key = query
        .page
        .as_deref()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .unwrap_or(1);

    if let Some(body) = state.cache.get(cache_key).await {
        return Ok(json_bytes(body));
    }

    let service = FeedService::new(state.db.clone());
    let page = service
        .page(FeedScope::Global, query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to load index feed");
            AppError::internal("failed to load index feed")
        })?;

    let body = serde_json::to_vec(&IndexResponse { page }).map_err(|err| {
        tracing::error!(error = ?err, "failed to render index feed");
        AppError::internal("failed to render index feed")
    })?;
    let body = Bytes::from(body);
    state.cache.insert(cache_key, body.clone()).await;

    Ok(json_bytes(body))
}

#[derive(Serialize)]
pub struct GroupResponse {
    pub group: Group,
    pub page: Page<Post>,
}

pub async fn group_posts(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupResponse>, AppError> {
    let groups = GroupService::new(state.db.clone());
    let group = groups
        .get_by_slug(&slug)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to fetch group");
            AppError::internal("failed to fetch group")
        })?
        .ok_or_else(|| AppError::not_found("group not found"))?;

    let service = FeedService::new(state.db.clone());
    let page = service
        .page(FeedScope::Group(group.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, slug = %slug, "failed to load group feed");
            AppError::internal("failed to load group feed")
        })?;

    Ok(Json(GroupResponse { group, page }))
}

#[derive(Serialize)]
pub struct FollowIndexResponse {
    pub page: Page<Post>,
}

pub async fn follow_index(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FollowIndexResponse>, AppError> {
    let service = FeedService::new(state.db.clone());
    let page = service
        .page(FeedScope::FollowedBy(auth.user_id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to load follow feed");
            AppError::internal("failed to load follow feed")
        })?;

    Ok(Json(FollowIndexResponse { page }))
}

// ---------------------------------------------------------------------------
// Profiles and follows
// ---------------------------------------------------------------------------

async fn find_author(state: &AppState, username: &str) -> Result<User, AppError> {
    let service = UserService::new(state.db.clone());
    service
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub author: User,
    pub count: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub following: bool,
    pub page: Page<Post>,
}

pub async fn profile(
    Path(username): Path<String>,
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileResponse>, AppError> {
    let author = find_author(&state, &username).await?;

    let feed = FeedService::new(state.db.clone());
    let page = feed
        .page(FeedScope::Author(author.id), query.page.as_deref())
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, author_id = author.id, "failed to load profile feed");
            AppError::internal("failed to load profile feed")
        })?;

    let social = SocialService::new(state.db.clone());
    let counts = async {
        let followers = social.followers_count(author.id).await?;
        let following = social.following_count(author.id).await?;
        let is_following = match &auth {
            Some(viewer) => social.is_following(viewer.user_id, author.id).await?,
            None => false,
        };
        anyhow::Ok((followers, following, is_following))
    };
    let (followers_count, following_count, following) = counts.await.map_err(|err| {
        tracing::error!(error = ?err, author_id = author.id, "failed to load follow counts");
        AppError::internal("failed to load follow counts")
    })?;

    Ok(Json(ProfileResponse {
        count: page.count,
        author,
        followers_count,
        following_count,
        following,
        page,
    }))
}

pub async fn profile_follow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let author = find_author(&state, &username).await?;

    let service = SocialService::new(state.db.clone());
    let follow = service.follow(auth.user_id, author.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = auth.user_id, author_id = author.id, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    if let Some(follow) = follow {
        tracing::info!(user_id = follow.user_id, author_id = follow.author_id, "followed author");
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

pub async fn profile_unfollow(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let author = find_author(&state, &username).await?;

    let service = SocialService::new(state.db.clone());
    let unfollowed = service
        .unfollow(auth.user_id, author.id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, author_id = author.id, "failed to unfollow user");
            AppError::internal("failed to unfollow user")
        })?;

    if unfollowed {
        tracing::info!(user_id = auth.user_id, author_id = author.id, "unfollowed author");
    }

    Ok(Redirect::to(&profile_url(&author.username)))
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

async fn find_post(state: &AppState, username: &str, post_id: i64) -> Result<Post, AppError> {
    let service = PostService::new(state.db.clone());
    service
        .get_by_author(username, post_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))
}

/// A body cut off by the request size limit can only be an oversized
/// image, so it is reported against that field.
fn multipart_rejection(err: MultipartError, field: &str) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        let mut errors = FormErrors::default();
        errors.add("image", forms::IMAGE_TOO_LARGE);
        return AppError::invalid_form(errors);
    }
    AppError::bad_request(format!("invalid {}: {}", field, err))
}

async fn read_post_form(mut multipart: Multipart) -> Result<PostForm, AppError> {
    let mut form = PostForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_rejection(err, "multipart body"))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "text" => {
                form.text = field
                    .text()
                    .await
                    .map_err(|err| multipart_rejection(err, "text field"))?;
            }
            "group" => {
                form.group = Some(
                    field
                        .text()
                        .await
                        .map_err(|err| multipart_rejection(err, "group field"))?,
                );
            }
            "image" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_rejection(err, "image field"))?;
                // An untouched file input arrives as an empty, unnamed part.
                if !file_name.is_empty() || !data.is_empty() {
                    form.image = Some(UploadedImage { file_name, data });
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn store_image(state: &AppState, image: Option<UploadedImage>) -> Result<Option<String>, AppError> {
    let Some(image) = image else {
        return Ok(None);
    };

    let path = state
        .storage
        .save(POST_UPLOAD_DIR, &image.file_name, &image.data)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, file_name = %image.file_name, "failed to store image");
            AppError::internal("failed to store image")
        })?;

    Ok(Some(path))
}

async fn discard_image(state: &AppState, image: Option<&str>) {
    let Some(image) = image else {
        return;
    };
    if let Err(err) = state.storage.delete(image).await {
        tracing::warn!(error = ?err, image = %image, "failed to remove image");
    }
}

#[derive(Serialize)]
pub struct PostFormResponse {
    pub form: PostFormSpec,
    pub is_new_post: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Post>,
}

async fn post_form_spec(state: &AppState, post: Option<&Post>) -> Result<PostFormSpec, AppError> {
    let groups = GroupService::new(state.db.clone())
        .list_groups()
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to list groups");
            AppError::internal("failed to list groups")
        })?;

    Ok(PostFormSpec::new(groups, post))
}

pub async fn new_post_form(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<PostFormResponse>, AppError> {
    Ok(Json(PostFormResponse {
        form: post_form_spec(&state, None).await?,
        is_new_post: true,
        post: None,
    }))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let form = read_post_form(multipart).await?;
    let groups = GroupService::new(state.db.clone());
    let cleaned = form
        .clean(&groups, state.upload_max_bytes)
        .await
        .map_err(|err| form_rejection(err, "failed to validate post"))?;

    let image = store_image(&state, cleaned.image).await?;

    let service = PostService::new(state.db.clone());
    let created = service
        .create_post(auth.user_id, cleaned.text, cleaned.group_id, image.clone())
        .await;
    let post = match created {
        Ok(post) => post,
        Err(err) => {
            tracing::error!(error = ?err, author_id = auth.user_id, "failed to create post");
            discard_image(&state, image.as_deref()).await;
            return Err(AppError::internal("failed to create post"));
        }
    };

    tracing::info!(post_id = post.id, author_id = post.author_id, "post created");
    Ok(Redirect::to("/"))
}

#[derive(Serialize)]
pub struct PostViewResponse {
    pub post: Post,
    pub author: User,
    pub count: i64,
    pub comments: Vec<Comment>,
    pub comments_count: i64,
    pub form: Vec<FieldSpec>,
}

pub async fn post_view(
    Path((username, post_id)): Path<(String, String)>,
    State(state): State<AppState>,
) -> Result<Json<PostViewResponse>, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = find_post(&state, &username, post_id).await?;
    let author = find_author(&state, &post.author_username).await?;

    let posts = PostService::new(state.db.clone());
    let comments = CommentService::new(state.db.clone());
    let loaded = async {
        let count = posts.count_by_author(author.id).await?;
        let items = comments.list_for_post(post.id).await?;
        let comments_count = comments.count_for_post(post.id).await?;
        anyhow::Ok((count, items, comments_count))
    };
    let (count, comments, comments_count) = loaded.await.map_err(|err| {
        tracing::error!(error = ?err, post_id, "failed to load post details");
        AppError::internal("failed to load post details")
    })?;

    Ok(Json(PostViewResponse {
        post,
        author,
        count,
        comments,
        comments_count,
        form: forms::comment_fields(),
    }))
}

pub async fn post_edit_form(
    Path((username, post_id)): Path<(String, String)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = find_post(&state, &username, post_id).await?;
    if post.author_id != auth.user_id {
        return Ok(Redirect::to(&post_url(&post.author_username, post.id)).into_response());
    }

    let form = post_form_spec(&state, Some(&post)).await?;
    Ok(Json(PostFormResponse {
        form,
        is_new_post: false,
        post: Some(post),
    })
    .into_response())
}

pub async fn post_edit(
    Path((username, post_id)): Path<(String, String)>,
    auth: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Redirect, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = find_post(&state, &username, post_id).await?;
    let view_url = post_url(&post.author_username, post.id);
    if post.author_id != auth.user_id {
        tracing::warn!(post_id, user_id = auth.user_id, "edit attempt by non-author");
        return Ok(Redirect::to(&view_url));
    }

    let form = read_post_form(multipart).await?;
    let groups = GroupService::new(state.db.clone());
    let cleaned = form
        .clean(&groups, state.upload_max_bytes)
        .await
        .map_err(|err| form_rejection(err, "failed to validate post"))?;

    let image = store_image(&state, cleaned.image).await?;

    let service = PostService::new(state.db.clone());
    let updated = service
        .update_post(post.id, cleaned.text, cleaned.group_id, image.clone())
        .await;
    match updated {
        Ok(Some(_)) => {}
        Ok(None) => {
            discard_image(&state, image.as_deref()).await;
            return Err(AppError::not_found("post not found"));
        }
        Err(err) => {
            tracing::error!(error = ?err, post_id, "failed to update post");
            discard_image(&state, image.as_deref()).await;
            return Err(AppError::internal("failed to update post"));
        }
    }

    // the new upload always lands under a fresh name
    if image.is_some() {
        discard_image(&state, post.image.as_deref()).await;
    }

    tracing::info!(post_id, author_id = auth.user_id, "post updated");
    Ok(Redirect::to(&view_url))
}

pub async fn post_delete(
    Path((username, post_id)): Path<(String, String)>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Redirect, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = find_post(&state, &username, post_id).await?;
    if post.author_id != auth.user_id {
        tracing::warn!(post_id, user_id = auth.user_id, "delete attempt by non-author");
        return Ok(Redirect::to(&post_url(&post.author_username, post.id)));
    }

    let service = PostService::new(state.db.clone());
    let deleted = service
        .delete_post(post.id, auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to delete post");
            AppError::internal("failed to delete post")
        })?;

    if deleted {
        discard_image(&state, post.image.as_deref()).await;
        tracing::info!(post_id, author_id = auth.user_id, "post deleted");
    }

    Ok(Redirect::to(&profile_url(&post.author_username)))
}

pub async fn add_comment(
    Path((username, post_id)): Path<(String, String)>,
    auth: AuthUser,
    State(state): State<AppState>,
    Form(form): Form<CommentForm>,
) -> Result<Redirect, AppError> {
    let post_id = parse_post_id(&post_id)?;
    let post = find_post(&state, &username, post_id).await?;

    if let Err(errors) = form.validate() {
        return Err(AppError::invalid_form(FormErrors::from(errors)));
    }

    let service = CommentService::new(state.db.clone());
    let comment = service
        .add_comment(post.id, auth.user_id, form.text)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id, "failed to add comment");
            AppError::internal("failed to add comment")
        })?;

    tracing::info!(comment_id = comment.id, post_id, author_id = auth.user_id, "comment added");
    Ok(Redirect::to(&post_url(&post.author_username, post.id)))
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

#[derive(Serialize)]
pub struct LoginFormResponse {
    pub form: Vec<FieldSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

pub async fn login_form(Query(query): Query<LoginQuery>) -> Json<LoginFormResponse> {
    Json(LoginFormResponse {
        form: forms::login_fields(),
        next: query.next,
    })
}

#[derive(Serialize)]
pub struct AuthTokenResponse {
    pub access_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginForm>,
) -> Result<Json<AuthTokenResponse>, AppError> {
    if let Err(errors) = payload.validate() {
        return Err(AppError::invalid_form(FormErrors::from(errors)));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let token = service
        .login(&payload.username, &payload.password)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to login");
            AppError::internal("failed to login")
        })?;

    match token {
        Some(token) => Ok(Json(AuthTokenResponse {
            access_token: token.token,
            expires_at: token.expires_at,
        })),
        None => Err(AppError::unauthorized("invalid credentials")),
    }
}

pub async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupForm>,
) -> Result<(StatusCode, Json<User>), AppError> {
    if let Err(errors) = payload.validate() {
        return Err(AppError::invalid_form(FormErrors::from(errors)));
    }

    let service = AuthService::new(
        state.db.clone(),
        state.paseto_access_key,
        state.access_ttl_minutes,
    );
    let user = service
        .signup(payload.username, payload.password)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return AppError::conflict("username already taken");
            }
            tracing::error!(error = ?err, "failed to create user");
            AppError::internal("failed to create user")
        })?;

    tracing::info!(user_id = user.id, username = %user.username, "user signed up");
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn delete_account(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = UserService::new(state.db.clone());
    let deleted = service
        .delete_account(auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = auth.user_id, "failed to delete account");
            AppError::internal("failed to delete account")
        })?;

    if deleted {
        tracing::info!(user_id = auth.user_id, "account deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("user not found"))
    }
}

// ---------------------------------------------------------------------------
// Group administration
// ---------------------------------------------------------------------------

pub async fn create_group(
    _admin: AdminToken,
    State(state): State<AppState>,
    Json(payload): Json<GroupForm>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    if let Err(errors) = payload.validate() {
        return Err(AppError::invalid_form(FormErrors::from(errors)));
    }

    let service = GroupService::new(state.db.clone());
    let group = service
        .create_group(payload.title, payload.slug, payload.description)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                return AppError::conflict("slug already taken");
            }
            tracing::error!(error = ?err, "failed to create group");
            AppError::internal("failed to create group")
        })?;

    tracing::info!(group_id = group.id, slug = %group.slug, "group created");
    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn delete_group(
    Path(slug): Path<String>,
    _admin: AdminToken,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    let service = GroupService::new(state.db.clone());
    let deleted = service.delete_group(&slug).await.map_err(|err| {
        tracing::error!(error = ?err, slug = %slug, "failed to delete group");
        AppError::internal("failed to delete group")
    })?;

    if deleted {
        tracing::info!(slug = %slug, "group deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::not_found("group not found"))
    }
}
