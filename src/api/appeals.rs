/// Appeal endpoints
use crate::{
    admin::Role,
    api::middleware::{AdminViewer, AuthedViewer},
    appeal::{Appeal, AppealDecision},
    context::AppContext,
    error::{AppError, AppResult},
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

/// Build appeal routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/appeals", post(create_appeal))
        .route("/api/appeals/can", get(can_appeal))
        .route("/api/appeals/:id/resolve", post(resolve_appeal))
        .route("/api/appeals/:id/withdraw", post(withdraw_appeal))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateAppealRequest {
    target_type: TargetType,
    target_id: String,
    #[validate(length(min = 1, max = 500))]
    reason: String,
    detail: Option<String>,
}

/// Open an appeal: 201 on success, 403 when there is nothing to appeal,
/// 409 when one is already pending. The conflict message is the one denial
/// allowed to be specific, since pendency is not sensitive.
async fn create_appeal(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Json(req): Json<CreateAppealRequest>,
) -> AppResult<(StatusCode, Json<Appeal>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let appeal = ctx
        .appeals
        .create(
            &viewer.id,
            req.target_type,
            &req.target_id,
            &req.reason,
            req.detail.as_deref(),
        )
        .await?;

    Ok((StatusCode::CREATED, Json(appeal)))
}

#[derive(Debug, Deserialize)]
struct CanAppealQuery {
    target_type: TargetType,
    target_id: String,
}

async fn can_appeal(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Query(query): Query<CanAppealQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let can = ctx
        .appeals
        .can_appeal(&viewer.id, query.target_type, &query.target_id)
        .await?;

    Ok(Json(serde_json::json!({ "canAppeal": can })))
}

#[derive(Debug, Deserialize)]
struct ResolveAppealRequest {
    decision: AppealDecision,
    note: Option<String>,
}

async fn resolve_appeal(
    State(ctx): State<AppContext>,
    admin: AdminViewer,
    Path(id): Path<i64>,
    Json(req): Json<ResolveAppealRequest>,
) -> AppResult<Json<Appeal>> {
    admin.require(Role::Admin)?;

    let appeal = ctx
        .appeals
        .resolve(id, &admin.id, req.decision, req.note.as_deref())
        .await?;

    ctx.admin_roles
        .log_action(
            &admin.id,
            "appeal.resolve",
            Some(appeal.target_type.as_str()),
            Some(&appeal.target_id),
            req.note.as_deref(),
        )
        .await?;

    Ok(Json(appeal))
}

async fn withdraw_appeal(
    State(ctx): State<AppContext>,
    viewer: AuthedViewer,
    Path(id): Path<i64>,
) -> AppResult<Json<Appeal>> {
    let appeal = ctx.appeals.withdraw(id, &viewer.id).await?;

    Ok(Json(appeal))
}
