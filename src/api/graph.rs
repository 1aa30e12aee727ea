/// Follow/block graph endpoints
use crate::{
    api::middleware::AuthedViewer,
    context::AppContext,
    error::AppResult,
    policy,
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;

/// Build graph routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/graph/follow", post(follow))
        .route("/api/graph/unfollow", post(unfollow))
        .route("/api/graph/block", post(block))
        .route("/api/graph/unblock", post(unblock))
}

#[derive(Debug, Deserialize)]
struct EdgeRequest {
    target_user_id: String,
}

async fn follow(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<EdgeRequest>,
) -> AppResult<StatusCode> {
    let standing = ctx.accounts.standing(&viewer.id).await?;
    policy::assert_account_active(&standing)?;

    ctx.relationships.follow(&viewer.id, &req.target_user_id).await?;

    Ok(StatusCode::OK)
}

async fn unfollow(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<EdgeRequest>,
) -> AppResult<StatusCode> {
    ctx.relationships
        .unfollow(&viewer.id, &req.target_user_id)
        .await?;

    Ok(StatusCode::OK)
}

async fn block(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<EdgeRequest>,
) -> AppResult<StatusCode> {
    ctx.relationships.block(&viewer.id, &req.target_user_id).await?;

    Ok(StatusCode::OK)
}

async fn unblock(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<EdgeRequest>,
) -> AppResult<StatusCode> {
    ctx.relationships
        .unblock(&viewer.id, &req.target_user_id)
        .await?;

    Ok(StatusCode::OK)
}
