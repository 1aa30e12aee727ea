/// Post, comment, and chat message endpoints
use crate::{
    api::content::require_manage,
    api::middleware::AuthedViewer,
    content::{Post, VisibilityRule},
    context::AppContext,
    error::{AppError, AppResult},
    policy,
    post_tags::PostUserTag,
    visibility::{RuleKind, TargetType, Visibility},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, patch, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build post routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/posts", post(create_post))
        .route("/api/posts/:id/visibility", patch(update_visibility))
        .route("/api/posts/:id", delete(delete_post))
        .route("/api/posts/:id/comments", post(create_comment))
        .route("/api/chat/messages", post(create_chat_message))
        .route("/api/posts/:id/tags", post(create_post_tag))
        .route("/api/tags/:tag_id/accept", post(accept_tag))
        .route("/api/tags/:tag_id/reject", post(reject_tag))
        .route("/api/tags/:tag_id/remove", post(remove_tag))
}

#[derive(Debug, Deserialize)]
struct RuleEntry {
    user_id: String,
    rule: RuleKind,
}

#[derive(Debug, Deserialize, Validate)]
struct CreatePostRequest {
    #[validate(length(min = 1, max = 3000))]
    text: String,
    visibility: Option<Visibility>,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

fn into_rules(entries: Vec<RuleEntry>) -> Vec<VisibilityRule> {
    entries
        .into_iter()
        .map(|e| VisibilityRule {
            user_id: e.user_id,
            rule: e.rule,
        })
        .collect()
}

/// Account standing is checked before every mutation; the denial is the
/// same generic 403 whichever flag tripped.
async fn require_active(ctx: &AppContext, user_id: &str) -> AppResult<()> {
    let standing = ctx.accounts.standing(user_id).await?;
    policy::assert_account_active(&standing)?;
    Ok(())
}

async fn create_post(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<CreatePostRequest>,
) -> AppResult<(StatusCode, Json<Post>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    require_active(&ctx, &viewer.id).await?;

    let post = ctx
        .content
        .create_post(
            &viewer.id,
            &req.text,
            req.visibility.unwrap_or(Visibility::Public),
            &into_rules(req.rules),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(post)))
}

#[derive(Debug, Deserialize)]
struct UpdateVisibilityRequest {
    visibility: Visibility,
    #[serde(default)]
    rules: Vec<RuleEntry>,
}

async fn update_visibility(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(id): Path<String>,
    Json(req): Json<UpdateVisibilityRequest>,
) -> AppResult<StatusCode> {
    require_active(&ctx, &viewer.id).await?;
    require_manage(&ctx, &viewer.id, viewer.is_admin(), TargetType::Post, &id).await?;

    ctx.content
        .update_visibility(
            &id,
            &viewer.id,
            viewer.role,
            req.visibility,
            &into_rules(req.rules),
        )
        .await?;

    Ok(StatusCode::OK)
}

async fn delete_post(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    require_active(&ctx, &viewer.id).await?;
    require_manage(&ctx, &viewer.id, viewer.is_admin(), TargetType::Post, &id).await?;

    ctx.content.delete_post(&id, &viewer.id, viewer.role).await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize, Validate)]
struct CreateCommentRequest {
    #[validate(length(min = 1, max = 1000))]
    text: String,
}

async fn create_comment(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(post_id): Path<String>,
    Json(req): Json<CreateCommentRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    require_active(&ctx, &viewer.id).await?;

    let id = ctx
        .content
        .create_comment(&post_id, &viewer.id, &req.text)
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateChatMessageRequest {
    recipient_id: String,
    #[validate(length(min = 1, max = 1000))]
    text: String,
}

async fn create_chat_message(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<CreateChatMessageRequest>,
) -> AppResult<(StatusCode, Json<serde_json::Value>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    require_active(&ctx, &viewer.id).await?;

    // Blocked pairs cannot message each other
    if ctx
        .relationships
        .is_blocked_either(&viewer.id, &req.recipient_id)
        .await?
    {
        return Err(AppError::Forbidden);
    }

    let id = ctx
        .content
        .create_chat_message(&viewer.id, &req.recipient_id, &req.text)
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

#[derive(Debug, Deserialize)]
struct CreatePostTagRequest {
    tagged_user_id: String,
}

async fn create_post_tag(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(post_id): Path<String>,
    Json(req): Json<CreatePostTagRequest>,
) -> AppResult<(StatusCode, Json<PostUserTag>)> {
    require_active(&ctx, &viewer.id).await?;

    let post = ctx
        .content
        .get_post(&post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;
    policy::assert_owner(&viewer.id, &post.author_id)?;

    let tag = ctx
        .post_tags
        .create(&post_id, &req.tagged_user_id, &viewer.id)
        .await?;

    Ok((StatusCode::CREATED, Json(tag)))
}

async fn accept_tag(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(tag_id): Path<i64>,
) -> AppResult<Json<PostUserTag>> {
    let tag = ctx.post_tags.respond(tag_id, &viewer.id, true).await?;
    Ok(Json(tag))
}

async fn reject_tag(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(tag_id): Path<i64>,
) -> AppResult<Json<PostUserTag>> {
    let tag = ctx.post_tags.respond(tag_id, &viewer.id, false).await?;
    Ok(Json(tag))
}

async fn remove_tag(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(tag_id): Path<i64>,
) -> AppResult<Json<PostUserTag>> {
    let existing = ctx
        .post_tags
        .get(tag_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", tag_id)))?;

    let post = ctx
        .content
        .get_post(&existing.post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post {} not found", existing.post_id)))?;

    let tag = ctx
        .post_tags
        .remove(tag_id, &viewer.id, &post.author_id)
        .await?;

    Ok(Json(tag))
}
