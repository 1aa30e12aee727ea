/// Content detail endpoints
///
/// The one place where the decision engine meets HTTP: fetch the facts,
/// decide, map the decision to a status code. The same resolution path is
/// shared by the detail view, the share-link view, and the edit/delete gate
/// so precedence cannot drift between call sites.
use crate::{
    api::middleware::Viewer,
    content::{self, Post},
    context::AppContext,
    error::{AppError, AppResult},
    visibility::{self, ContentFacts, Decision, TargetType, ViewerFacts},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;

/// Build content routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/content/:target_type/:id", get(get_content))
        .route("/api/content/:target_type/:id/shared", get(get_shared_content))
}

#[derive(Debug, Serialize)]
struct ContentResponse {
    decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    post: Option<Post>,
}

/// Stored facts with the target's moderation state overlaid, so a hide
/// action or force-visibility override is part of what the engine sees.
async fn effective_facts(
    ctx: &AppContext,
    target_type: TargetType,
    target_id: &str,
) -> AppResult<Option<ContentFacts>> {
    let facts = ctx.content.load_facts(target_type, target_id).await?;

    match facts {
        Some(facts) => {
            let state = ctx.moderation.state_for(target_type, target_id).await?;
            Ok(Some(content::apply_moderation(facts, &state)))
        }
        None => Ok(None),
    }
}

/// Resolve the read-path visibility decision for a viewer and target.
pub(crate) async fn resolve_decision(
    ctx: &AppContext,
    viewer: &Viewer,
    target_type: TargetType,
    target_id: &str,
) -> AppResult<(Decision, bool)> {
    let facts = match effective_facts(ctx, target_type, target_id).await? {
        Some(facts) => facts,
        None => return Ok((Decision::NotFound, false)),
    };

    let viewer_facts = ctx
        .relationships
        .viewer_facts(viewer.id.as_deref(), &facts, viewer.is_admin())
        .await?;

    let decision = visibility::decide(Some(&facts), &viewer_facts);

    Ok((decision, viewer_facts.is_owner))
}

/// Gate for edit/delete paths: the same facts resolution, decided by the
/// management rules. Hidden content stays locked for its author while a
/// moderation action stands; admins pass through for moderation tooling.
pub(crate) async fn require_manage(
    ctx: &AppContext,
    viewer_id: &str,
    is_admin: bool,
    target_type: TargetType,
    target_id: &str,
) -> AppResult<()> {
    let facts = effective_facts(ctx, target_type, target_id).await?;

    let viewer_facts = match &facts {
        Some(facts) => {
            ctx.relationships
                .viewer_facts(Some(viewer_id), facts, is_admin)
                .await?
        }
        None => ViewerFacts::default(),
    };

    match visibility::decide_manage(facts.as_ref(), &viewer_facts) {
        Decision::Ok => Ok(()),
        Decision::NotFound => Err(AppError::NotFound(format!(
            "{} {} not found",
            target_type.as_str(),
            target_id
        ))),
        Decision::PostDeleted => Err(AppError::Conflict("Content is deleted".to_string())),
        _ => Err(AppError::Forbidden),
    }
}

/// Content detail. Hidden and deleted content is masked as not-found for
/// everyone but the owner.
async fn get_content(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path((target_type, id)): Path<(String, String)>,
) -> AppResult<(StatusCode, Json<ContentResponse>)> {
    let target_type = TargetType::from_str(&target_type)?;
    if target_type == TargetType::User {
        return Err(AppError::Validation(
            "Users are not a viewable content target".to_string(),
        ));
    }

    let (decision, is_owner) = resolve_decision(&ctx, &viewer, target_type, &id).await?;
    let decision = decision.masked(is_owner);

    let post = if decision.is_ok() && target_type == TargetType::Post {
        ctx.content.get_post(&id).await?
    } else {
        None
    };

    Ok((
        decision.http_status(),
        Json(ContentResponse { decision, post }),
    ))
}

/// Share-link view: same resolution, but the decision is coarsened so the
/// response cannot reveal follow-graph state.
async fn get_shared_content(
    State(ctx): State<AppContext>,
    viewer: Viewer,
    Path((target_type, id)): Path<(String, String)>,
) -> AppResult<(StatusCode, Json<ContentResponse>)> {
    let target_type = TargetType::from_str(&target_type)?;
    if target_type == TargetType::User {
        return Err(AppError::Validation(
            "Users are not a viewable content target".to_string(),
        ));
    }

    let (decision, is_owner) = resolve_decision(&ctx, &viewer, target_type, &id).await?;
    let decision = decision.coarse().masked(is_owner);

    let post = if decision.is_ok() && target_type == TargetType::Post {
        ctx.content.get_post(&id).await?
    } else {
        None
    };

    Ok((
        decision.http_status(),
        Json(ContentResponse { decision, post }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LimitsConfig, LoggingConfig, ServerConfig, ServiceConfig, StorageConfig};
    use crate::moderation::ActionDetail;
    use crate::visibility::Visibility;
    use sqlx::SqlitePool;

    const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

    fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 0,
                version: "test".to_string(),
            },
            storage: StorageConfig {
                data_directory: "./data".into(),
                core_db: ":memory:".into(),
            },
            limits: LimitsConfig {
                max_post_length: 3000,
                max_hashtags_per_post: 5,
                max_hashtag_length: 30,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }

    async fn setup_ctx() -> AppContext {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::raw_sql(MIGRATION).execute(&db).await.unwrap();
        sqlx::query("INSERT INTO users (id, handle, created_at) VALUES ('alice', 'alice', '2026-01-01T00:00:00Z')")
            .execute(&db)
            .await
            .unwrap();
        AppContext::from_pool(test_config(), db)
    }

    #[tokio::test]
    async fn test_hidden_post_is_locked_for_its_author() {
        let ctx = setup_ctx().await;
        let post = ctx
            .content
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();
        ctx.moderation
            .apply_action(TargetType::Post, &post.id, ActionDetail::Hide {}, "tos", "admin1")
            .await
            .unwrap();

        // Moderation enforcement applies to the author too: no re-leveling
        // or deleting while the hide action stands
        let err = require_manage(&ctx, "alice", false, TargetType::Post, &post.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        // Admins reach hidden content
        require_manage(&ctx, "admin1", true, TargetType::Post, &post.id)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_manage_requires_ownership_or_admin() {
        let ctx = setup_ctx().await;
        let post = ctx
            .content
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();

        require_manage(&ctx, "alice", false, TargetType::Post, &post.id)
            .await
            .unwrap();
        require_manage(&ctx, "bob", true, TargetType::Post, &post.id)
            .await
            .unwrap();

        let err = require_manage(&ctx, "bob", false, TargetType::Post, &post.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_manage_on_deleted_content_conflicts() {
        let ctx = setup_ctx().await;
        let post = ctx
            .content
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();
        ctx.content.delete_post(&post.id, "alice", None).await.unwrap();

        let err = require_manage(&ctx, "alice", false, TargetType::Post, &post.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_manage_on_missing_content_is_not_found() {
        let ctx = setup_ctx().await;

        let err = require_manage(&ctx, "alice", false, TargetType::Post, "nope")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
