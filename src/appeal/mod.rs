/// Appeal Workflow
///
/// State machine for contesting a moderation action: `pending` moves to
/// `approved`/`rejected` (admin) or `withdrawn` (appellant); terminal states
/// are final. The at-most-one-pending-appeal invariant per (user, target) is
/// enforced by a partial unique index, so two concurrent submissions cannot
/// both succeed. Approval reverses the originating moderation action in the
/// same transaction as the status change.
use crate::error::{AppError, AppResult};
use crate::moderation;
use crate::visibility::TargetType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Appeal lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealStatus {
    Pending,
    Approved,
    Rejected,
    Withdrawn,
}

impl AppealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppealStatus::Pending => "pending",
            AppealStatus::Approved => "approved",
            AppealStatus::Rejected => "rejected",
            AppealStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(AppealStatus::Pending),
            "approved" => Ok(AppealStatus::Approved),
            "rejected" => Ok(AppealStatus::Rejected),
            "withdrawn" => Ok(AppealStatus::Withdrawn),
            _ => Err(AppError::Validation(format!("Invalid appeal status: {}", s))),
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppealStatus::Pending)
    }
}

/// Admin resolution outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppealDecision {
    Approved,
    Rejected,
}

/// Appeal record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appeal {
    pub id: i64,
    pub user_id: String,
    pub target_type: TargetType,
    pub target_id: String,
    pub status: AppealStatus,
    pub reason: String,
    pub detail: Option<String>,
    pub moderation_action_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub resolution_note: Option<String>,
}

/// Appeal manager
#[derive(Clone)]
pub struct AppealManager {
    db: SqlitePool,
}

impl AppealManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Whether the user may open an appeal for this target: true only when
    /// an unreversed moderation action exists and no pending appeal from
    /// this user does.
    pub async fn can_appeal(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<bool> {
        let action_id = self.latest_action_id(target_type, target_id).await?;
        if action_id.is_none() {
            return Ok(false);
        }

        let pending: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM appeals
            WHERE user_id = ? AND target_type = ? AND target_id = ? AND status = 'pending'
            "#,
        )
        .bind(user_id)
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(pending.is_none())
    }

    /// Open an appeal. Fails with Forbidden when there is nothing to appeal
    /// and with Conflict when a pending appeal already exists; the conflict
    /// path is backed by the unique index, so a race between two submissions
    /// resolves to exactly one created row.
    pub async fn create(
        &self,
        user_id: &str,
        target_type: TargetType,
        target_id: &str,
        reason: &str,
        detail: Option<&str>,
    ) -> AppResult<Appeal> {
        let action_id = self.latest_action_id(target_type, target_id).await?;
        let action_id = match action_id {
            Some(id) => id,
            None => {
                tracing::debug!(target = target_id, "appeal refused: nothing to appeal");
                return Err(AppError::Forbidden);
            }
        };

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO appeals
            (user_id, target_type, target_id, status, reason, detail, moderation_action_id, created_at)
            VALUES (?, ?, ?, 'pending', ?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(target_type.as_str())
        .bind(target_id)
        .bind(reason)
        .bind(detail)
        .bind(action_id)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict("An appeal is already pending for this content".to_string())
            }
            _ => AppError::Database(e),
        })?;

        Ok(Appeal {
            id: result.last_insert_rowid(),
            user_id: user_id.to_string(),
            target_type,
            target_id: target_id.to_string(),
            status: AppealStatus::Pending,
            reason: reason.to_string(),
            detail: detail.map(String::from),
            moderation_action_id: Some(action_id),
            created_at: now,
            resolved_at: None,
            resolved_by: None,
            resolution_note: None,
        })
    }

    /// Resolve a pending appeal. Approval reverses the originating
    /// moderation action inside the same transaction.
    pub async fn resolve(
        &self,
        appeal_id: i64,
        admin_id: &str,
        decision: AppealDecision,
        note: Option<&str>,
    ) -> AppResult<Appeal> {
        let appeal = self
            .get(appeal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appeal {} not found", appeal_id)))?;

        if appeal.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Appeal {} is already {}",
                appeal_id,
                appeal.status.as_str()
            )));
        }

        let status = match decision {
            AppealDecision::Approved => AppealStatus::Approved,
            AppealDecision::Rejected => AppealStatus::Rejected,
        };
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        // Guard on status again inside the transaction: a concurrent
        // resolve/withdraw between the read above and this update loses.
        let result = sqlx::query(
            r#"
            UPDATE appeals
            SET status = ?, resolved_at = ?, resolved_by = ?, resolution_note = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(status.as_str())
        .bind(now.to_rfc3339())
        .bind(admin_id)
        .bind(note)
        .bind(appeal_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Appeal {} is no longer pending",
                appeal_id
            )));
        }

        if decision == AppealDecision::Approved {
            if let Some(action_id) = appeal.moderation_action_id {
                moderation::reverse_action_tx(&mut tx, action_id, admin_id).await?;
            }
        }

        tx.commit().await?;

        tracing::info!(
            appeal = appeal_id,
            decision = status.as_str(),
            admin = admin_id,
            "appeal resolved"
        );

        Ok(Appeal {
            status,
            resolved_at: Some(now),
            resolved_by: Some(admin_id.to_string()),
            resolution_note: note.map(String::from),
            ..appeal
        })
    }

    /// Withdraw a pending appeal. Only the original appellant may withdraw.
    pub async fn withdraw(&self, appeal_id: i64, user_id: &str) -> AppResult<Appeal> {
        let appeal = self
            .get(appeal_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Appeal {} not found", appeal_id)))?;

        if appeal.user_id != user_id {
            return Err(AppError::Forbidden);
        }

        if appeal.status.is_terminal() {
            return Err(AppError::Conflict(format!(
                "Appeal {} is already {}",
                appeal_id,
                appeal.status.as_str()
            )));
        }

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE appeals
            SET status = 'withdrawn', resolved_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(appeal_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "Appeal {} is no longer pending",
                appeal_id
            )));
        }

        Ok(Appeal {
            status: AppealStatus::Withdrawn,
            resolved_at: Some(now),
            ..appeal
        })
    }

    /// Get an appeal by id
    pub async fn get(&self, appeal_id: i64) -> AppResult<Option<Appeal>> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, target_type, target_id, status, reason, detail,
                   moderation_action_id, created_at, resolved_at, resolved_by, resolution_note
            FROM appeals
            WHERE id = ?
            "#,
        )
        .bind(appeal_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(parse_appeal).transpose()
    }

    /// List pending appeals for the admin review queue, oldest first
    pub async fn pending_queue(&self, limit: i64) -> AppResult<Vec<Appeal>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, target_type, target_id, status, reason, detail,
                   moderation_action_id, created_at, resolved_at, resolved_by, resolution_note
            FROM appeals
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(parse_appeal).collect()
    }

    /// Shared read of "latest unreversed action" for this target. The same
    /// row feeds `can_appeal` and the back-reference stored on creation.
    async fn latest_action_id(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM moderation_actions
            WHERE target_type = ? AND target_id = ? AND reversed = 0
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(id)
    }
}

fn parse_appeal(row: sqlx::sqlite::SqliteRow) -> AppResult<Appeal> {
    let status = AppealStatus::from_str(&row.get::<String, _>("status"))?;
    let target_type = TargetType::from_str(&row.get::<String, _>("target_type"))?;

    let created_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
        .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))?
        .with_timezone(&Utc);
    let resolved_at = row
        .try_get::<String, _>("resolved_at")
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(Appeal {
        id: row.get("id"),
        user_id: row.get("user_id"),
        target_type,
        target_id: row.get("target_id"),
        status,
        reason: row.get("reason"),
        detail: row.get("detail"),
        moderation_action_id: row.get("moderation_action_id"),
        created_at,
        resolved_at,
        resolved_by: row.get("resolved_by"),
        resolution_note: row.get("resolution_note"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moderation::{ActionDetail, ModerationManager};

    async fn setup_db() -> SqlitePool {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        for ddl in [
            r#"
            CREATE TABLE moderation_actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action_type TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                reason TEXT NOT NULL,
                detail TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                created_at TEXT NOT NULL,
                reversed INTEGER NOT NULL DEFAULT 0,
                reversed_at TEXT,
                reversed_by TEXT
            )
            "#,
            r#"
            CREATE TABLE appeals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                target_type TEXT NOT NULL,
                target_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                reason TEXT NOT NULL,
                detail TEXT,
                moderation_action_id INTEGER,
                created_at TEXT NOT NULL,
                resolved_at TEXT,
                resolved_by TEXT,
                resolution_note TEXT
            )
            "#,
            r#"
            CREATE UNIQUE INDEX idx_appeals_one_pending
                ON appeals(user_id, target_type, target_id)
                WHERE status = 'pending'
            "#,
            r#"
            CREATE TABLE posts (
                id TEXT PRIMARY KEY,
                author_id TEXT NOT NULL,
                text TEXT NOT NULL,
                visibility TEXT NOT NULL DEFAULT 'public',
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                deleted_source TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        ] {
            sqlx::query(ddl).execute(&db).await.unwrap();
        }
        db
    }

    async fn hide_post(db: &SqlitePool, post_id: &str) -> i64 {
        sqlx::query("INSERT INTO posts (id, author_id, text, created_at) VALUES (?, 'alice', 'hi', ?)")
            .bind(post_id)
            .bind(Utc::now().to_rfc3339())
            .execute(db)
            .await
            .unwrap();

        let moderation = ModerationManager::new(db.clone());
        moderation
            .apply_action(TargetType::Post, post_id, ActionDetail::Hide {}, "tos", "admin1")
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_can_appeal_requires_an_active_action() {
        let db = setup_db().await;
        let manager = AppealManager::new(db.clone());

        assert!(!manager.can_appeal("alice", TargetType::Post, "p1").await.unwrap());

        hide_post(&db, "p1").await;
        assert!(manager.can_appeal("alice", TargetType::Post, "p1").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_without_action_is_forbidden() {
        let db = setup_db().await;
        let manager = AppealManager::new(db);

        let err = manager
            .create("alice", TargetType::Post, "p1", "unfair", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));
    }

    #[tokio::test]
    async fn test_duplicate_pending_appeal_conflicts() {
        let db = setup_db().await;
        hide_post(&db, "p1").await;
        let manager = AppealManager::new(db);

        manager
            .create("alice", TargetType::Post, "p1", "unfair", None)
            .await
            .unwrap();
        assert!(!manager.can_appeal("alice", TargetType::Post, "p1").await.unwrap());

        let err = manager
            .create("alice", TargetType::Post, "p1", "still unfair", None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_approval_reverses_action_and_unhides_content() {
        let db = setup_db().await;
        let action_id = hide_post(&db, "p1").await;
        let manager = AppealManager::new(db.clone());

        let appeal = manager
            .create("alice", TargetType::Post, "p1", "unfair", Some("context"))
            .await
            .unwrap();
        assert_eq!(appeal.moderation_action_id, Some(action_id));

        let resolved = manager
            .resolve(appeal.id, "admin2", AppealDecision::Approved, Some("agreed"))
            .await
            .unwrap();
        assert_eq!(resolved.status, AppealStatus::Approved);

        // Reinstatement happened in the same transaction
        let hidden: bool = sqlx::query_scalar("SELECT is_hidden FROM posts WHERE id = 'p1'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert!(!hidden);

        let reversed: bool =
            sqlx::query_scalar("SELECT reversed FROM moderation_actions WHERE id = ?")
                .bind(action_id)
                .fetch_one(&db)
                .await
                .unwrap();
        assert!(reversed);
    }

    #[tokio::test]
    async fn test_rejection_leaves_content_hidden_and_frees_slot() {
        let db = setup_db().await;
        hide_post(&db, "p1").await;
        let manager = AppealManager::new(db.clone());

        let appeal = manager
            .create("alice", TargetType::Post, "p1", "unfair", None)
            .await
            .unwrap();
        manager
            .resolve(appeal.id, "admin2", AppealDecision::Rejected, None)
            .await
            .unwrap();

        let hidden: bool = sqlx::query_scalar("SELECT is_hidden FROM posts WHERE id = 'p1'")
            .fetch_one(&db)
            .await
            .unwrap();
        assert!(hidden);

        // The action is still active, so a fresh appeal may be opened
        manager
            .create("alice", TargetType::Post, "p1", "second try", None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_terminal_appeals_are_immutable() {
        let db = setup_db().await;
        hide_post(&db, "p1").await;
        let manager = AppealManager::new(db);

        let appeal = manager
            .create("alice", TargetType::Post, "p1", "unfair", None)
            .await
            .unwrap();
        manager
            .resolve(appeal.id, "admin2", AppealDecision::Rejected, None)
            .await
            .unwrap();

        let err = manager
            .resolve(appeal.id, "admin2", AppealDecision::Approved, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = manager.withdraw(appeal.id, "alice").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_only_appellant_withdraws() {
        let db = setup_db().await;
        hide_post(&db, "p1").await;
        let manager = AppealManager::new(db);

        let appeal = manager
            .create("alice", TargetType::Post, "p1", "unfair", None)
            .await
            .unwrap();

        let err = manager.withdraw(appeal.id, "mallory").await.unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let withdrawn = manager.withdraw(appeal.id, "alice").await.unwrap();
        assert_eq!(withdrawn.status, AppealStatus::Withdrawn);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(
            AppealStatus::from_str("pending").unwrap(),
            AppealStatus::Pending
        );
        assert_eq!(
            AppealStatus::from_str("WITHDRAWN").unwrap(),
            AppealStatus::Withdrawn
        );
        assert!(AppealStatus::from_str("escalated").is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!AppealStatus::Pending.is_terminal());
        assert!(AppealStatus::Approved.is_terminal());
        assert!(AppealStatus::Rejected.is_terminal());
        assert!(AppealStatus::Withdrawn.is_terminal());
    }
}
