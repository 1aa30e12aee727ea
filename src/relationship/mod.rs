/// Relationship Facts Provider
///
/// Follow and block edges between users, plus assembly of the per-request
/// `ViewerFacts` the decision engine consumes. Blocks are stored
/// directionally; visibility treats a block in either direction as
/// suppressing.
use crate::error::{AppError, AppResult};
use crate::policy;
use crate::visibility::{ContentFacts, RuleKind, TargetType, ViewerFacts};
use chrono::Utc;
use sqlx::SqlitePool;

/// Relationship store
#[derive(Clone)]
pub struct RelationshipStore {
    db: SqlitePool,
}

impl RelationshipStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a follow edge. Idempotent.
    pub async fn follow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        policy::assert_not_self(follower_id, followee_id)?;

        // A block in either direction forbids following
        if self.is_blocked_either(follower_id, followee_id).await? {
            return Err(AppError::Forbidden);
        }

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO follows (follower_id, followee_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }

    pub async fn unfollow(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM follows WHERE follower_id = ? AND followee_id = ?")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Create a block edge. Severs any follow edges in both directions.
    pub async fn block(&self, blocker_id: &str, blocked_id: &str) -> AppResult<()> {
        policy::assert_not_self(blocker_id, blocked_id)?;

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO blocks (blocker_id, blocked_id, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .bind(Utc::now().to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM follows
            WHERE (follower_id = ?1 AND followee_id = ?2)
               OR (follower_id = ?2 AND followee_id = ?1)
            "#,
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(())
    }

    pub async fn unblock(&self, blocker_id: &str, blocked_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM blocks WHERE blocker_id = ? AND blocked_id = ?")
            .bind(blocker_id)
            .bind(blocked_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM follows WHERE follower_id = ? AND followee_id = ?",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count > 0)
    }

    /// Directional block check: has `blocker` blocked `blocked`?
    pub async fn is_blocked(&self, blocker_id: &str, blocked_id: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blocks WHERE blocker_id = ? AND blocked_id = ?",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_one(&self.db)
        .await?;

        Ok(count > 0)
    }

    /// Either-direction block check
    pub async fn is_blocked_either(&self, a: &str, b: &str) -> AppResult<bool> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM blocks
            WHERE (blocker_id = ?1 AND blocked_id = ?2)
               OR (blocker_id = ?2 AND blocked_id = ?1)
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_one(&self.db)
        .await?;

        Ok(count > 0)
    }

    /// Assemble the viewer-side facts for a decision. An anonymous viewer
    /// gets the all-false default: no ownership, no follow, no block, no
    /// custom rule.
    pub async fn viewer_facts(
        &self,
        viewer_id: Option<&str>,
        content: &ContentFacts,
        is_admin: bool,
    ) -> AppResult<ViewerFacts> {
        let viewer_id = match viewer_id {
            Some(id) => id,
            None => return Ok(ViewerFacts::default()),
        };

        let is_owner = viewer_id == content.author_id;
        let is_follower = self.is_following(viewer_id, &content.author_id).await?;
        let blocked_either = self
            .is_blocked_either(viewer_id, &content.author_id)
            .await?;

        let custom_rule = if content.kind == TargetType::Post {
            let rule: Option<String> = sqlx::query_scalar(
                "SELECT rule FROM post_visibility_rules WHERE post_id = ? AND user_id = ?",
            )
            .bind(&content.id)
            .bind(viewer_id)
            .fetch_optional(&self.db)
            .await?;

            rule.as_deref().map(RuleKind::from_str).transpose()?
        } else {
            None
        };

        Ok(ViewerFacts {
            is_owner,
            is_follower,
            blocked_either,
            is_admin,
            custom_rule,
        })
    }
}
