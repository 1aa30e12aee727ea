/// User registration endpoint
use crate::{
    account::User,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::Deserialize;
use validator::Validate;

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/users", post(create_user))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateUserRequest {
    #[validate(length(min = 1, max = 64))]
    handle: String,
}

async fn create_user(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateUserRequest>,
) -> AppResult<(StatusCode, Json<User>)> {
    req.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = ctx.accounts.create_user(&req.handle).await?;

    Ok((StatusCode::CREATED, Json(user)))
}
