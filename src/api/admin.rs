/// Admin moderation endpoints
use crate::{
    admin::Role,
    api::middleware::AdminViewer,
    appeal::Appeal,
    context::AppContext,
    error::{AppError, AppResult},
    moderation::{ActionDetail, ModerationAction},
    visibility::TargetType,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use validator::Validate;

/// Build admin routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/admin/moderation/actions", post(apply_action))
        .route(
            "/api/admin/moderation/actions/:id/reverse",
            post(reverse_action),
        )
        .route("/api/admin/moderation/history", get(get_history))
        .route("/api/admin/appeals/queue", get(get_appeal_queue))
        .route("/api/admin/roles/grant", post(grant_role))
        .route("/api/admin/roles/revoke", post(revoke_role))
}

#[derive(Debug, Deserialize, Validate)]
struct ApplyActionRequest {
    target_type: TargetType,
    target_id: String,
    detail: ActionDetail,
    #[validate(length(min = 1, max = 500))]
    reason: String,
}

async fn apply_action(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Json(req): Json<ApplyActionRequest>,
) -> AppResult<(StatusCode, Json<ModerationAction>)> {
    admin.require(Role::Admin)?;
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let action = ctx
        .moderation
        .apply_action(
            req.target_type,
            &req.target_id,
            req.detail,
            &req.reason,
            &admin.id,
        )
        .await?;

    ctx.admin_roles
        .log_action(
            &admin.id,
            "moderation.apply",
            Some(req.target_type.as_str()),
            Some(&req.target_id),
            Some(&req.reason),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(action)))
}

async fn reverse_action(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    admin.require(Role::Admin)?;

    ctx.moderation.reverse_action(id, &admin.id).await?;

    ctx.admin_roles
        .log_action(&admin.id, "moderation.reverse", None, None, None)
        .await?;

    Ok(StatusCode::OK)
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    target_type: TargetType,
    target_id: String,
}

/// Moderation history for a target. Moderators may look.
async fn get_history(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<ModerationAction>>> {
    admin.require(Role::Moderator)?;

    let history = ctx
        .moderation
        .history(query.target_type, &query.target_id)
        .await?;

    Ok(Json(history))
}

#[derive(Debug, Deserialize)]
struct QueueQuery {
    limit: Option<i64>,
}

async fn get_appeal_queue(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Query(query): Query<QueueQuery>,
) -> AppResult<Json<Vec<Appeal>>> {
    admin.require(Role::Moderator)?;

    let queue = ctx.appeals.pending_queue(query.limit.unwrap_or(50)).await?;

    Ok(Json(queue))
}

#[derive(Debug, Deserialize)]
struct RoleRequest {
    user_id: String,
    role: Option<Role>,
}

async fn grant_role(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Json(req): Json<RoleRequest>,
) -> AppResult<StatusCode> {
    admin.require(Role::SuperAdmin)?;

    let role = req
        .role
        .ok_or_else(|| AppError::Validation("Role is required".to_string()))?;
    ctx.admin_roles.grant_role(&req.user_id, role, &admin.id).await?;

    Ok(StatusCode::CREATED)
}

async fn revoke_role(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Json(req): Json<RoleRequest>,
) -> AppResult<StatusCode> {
    admin.require(Role::SuperAdmin)?;

    ctx.admin_roles.revoke_role(&req.user_id, &admin.id).await?;

    Ok(StatusCode::OK)
}
