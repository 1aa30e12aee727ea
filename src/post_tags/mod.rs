/// Post-user tags
///
/// A user tagged on a post confirms or declines the tag; the tagged user or
/// the post owner may remove it. Transitions out of a terminal state are
/// conflicts, transitions by the wrong actor are forbidden.
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Tag lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStatus {
    Pending,
    Accepted,
    Rejected,
    Removed,
}

impl TagStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagStatus::Pending => "pending",
            TagStatus::Accepted => "accepted",
            TagStatus::Rejected => "rejected",
            TagStatus::Removed => "removed",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TagStatus::Pending),
            "accepted" => Ok(TagStatus::Accepted),
            "rejected" => Ok(TagStatus::Rejected),
            "removed" => Ok(TagStatus::Removed),
            _ => Err(AppError::Validation(format!("Invalid tag status: {}", s))),
        }
    }
}

/// Post-user tag record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostUserTag {
    pub id: i64,
    pub post_id: String,
    pub tagged_user_id: String,
    pub tagged_by_user_id: String,
    pub status: TagStatus,
    pub created_at: DateTime<Utc>,
}

/// Post tag manager
#[derive(Clone)]
pub struct PostTagManager {
    db: SqlitePool,
}

impl PostTagManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Tag a user on a post; the tag starts pending
    pub async fn create(
        &self,
        post_id: &str,
        tagged_user_id: &str,
        tagged_by_user_id: &str,
    ) -> AppResult<PostUserTag> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO post_user_tags (post_id, tagged_user_id, tagged_by_user_id, status, created_at)
            VALUES (?, ?, ?, 'pending', ?)
            "#,
        )
        .bind(post_id)
        .bind(tagged_user_id)
        .bind(tagged_by_user_id)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(PostUserTag {
            id: result.last_insert_rowid(),
            post_id: post_id.to_string(),
            tagged_user_id: tagged_user_id.to_string(),
            tagged_by_user_id: tagged_by_user_id.to_string(),
            status: TagStatus::Pending,
            created_at: now,
        })
    }

    /// Accept or reject a pending tag. Only the tagged user may respond.
    pub async fn respond(&self, tag_id: i64, actor_id: &str, accept: bool) -> AppResult<PostUserTag> {
        let tag = self
            .get(tag_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", tag_id)))?;

        if tag.tagged_user_id != actor_id {
            return Err(AppError::Forbidden);
        }

        if tag.status != TagStatus::Pending {
            return Err(AppError::Conflict(format!(
                "Tag {} is already {}",
                tag_id,
                tag.status.as_str()
            )));
        }

        let status = if accept {
            TagStatus::Accepted
        } else {
            TagStatus::Rejected
        };

        self.set_status(tag_id, status).await?;

        Ok(PostUserTag { status, ..tag })
    }

    /// Remove a tag. Tagged user or post owner only; works from pending or
    /// accepted, but a rejected tag stays rejected.
    pub async fn remove(&self, tag_id: i64, actor_id: &str, post_owner_id: &str) -> AppResult<PostUserTag> {
        let tag = self
            .get(tag_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tag {} not found", tag_id)))?;

        if tag.tagged_user_id != actor_id && post_owner_id != actor_id {
            return Err(AppError::Forbidden);
        }

        match tag.status {
            TagStatus::Pending | TagStatus::Accepted => {}
            TagStatus::Rejected | TagStatus::Removed => {
                return Err(AppError::Conflict(format!(
                    "Tag {} is already {}",
                    tag_id,
                    tag.status.as_str()
                )))
            }
        }

        self.set_status(tag_id, TagStatus::Removed).await?;

        Ok(PostUserTag {
            status: TagStatus::Removed,
            ..tag
        })
    }

    /// Get a tag by id
    pub async fn get(&self, tag_id: i64) -> AppResult<Option<PostUserTag>> {
        let row = sqlx::query(
            r#"
            SELECT id, post_id, tagged_user_id, tagged_by_user_id, status, created_at
            FROM post_user_tags WHERE id = ?
            "#,
        )
        .bind(tag_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| {
            let status = TagStatus::from_str(&row.get::<String, _>("status"))?;
            let created_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);

            Ok(PostUserTag {
                id: row.get("id"),
                post_id: row.get("post_id"),
                tagged_user_id: row.get("tagged_user_id"),
                tagged_by_user_id: row.get("tagged_by_user_id"),
                status,
                created_at,
            })
        })
        .transpose()
    }

    async fn set_status(&self, tag_id: i64, status: TagStatus) -> AppResult<()> {
        sqlx::query("UPDATE post_user_tags SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(tag_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_db() -> SqlitePool {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        sqlx::query(
            r#"
            CREATE TABLE post_user_tags (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id TEXT NOT NULL,
                tagged_user_id TEXT NOT NULL,
                tagged_by_user_id TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_only_tagged_user_responds() {
        let manager = PostTagManager::new(setup_db().await);
        let tag = manager.create("p1", "bob", "alice").await.unwrap();

        assert!(manager.respond(tag.id, "alice", true).await.is_err());
        let accepted = manager.respond(tag.id, "bob", true).await.unwrap();
        assert_eq!(accepted.status, TagStatus::Accepted);
    }

    #[tokio::test]
    async fn test_respond_is_single_shot() {
        let manager = PostTagManager::new(setup_db().await);
        let tag = manager.create("p1", "bob", "alice").await.unwrap();

        manager.respond(tag.id, "bob", false).await.unwrap();
        // Terminal: a second response conflicts
        assert!(manager.respond(tag.id, "bob", true).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_by_tagged_user_or_post_owner() {
        let manager = PostTagManager::new(setup_db().await);

        let tag = manager.create("p1", "bob", "alice").await.unwrap();
        // carol is neither tagged nor owner
        assert!(manager.remove(tag.id, "carol", "alice").await.is_err());

        let removed = manager.remove(tag.id, "alice", "alice").await.unwrap();
        assert_eq!(removed.status, TagStatus::Removed);

        let tag2 = manager.create("p1", "bob", "alice").await.unwrap();
        let removed2 = manager.remove(tag2.id, "bob", "alice").await.unwrap();
        assert_eq!(removed2.status, TagStatus::Removed);
    }

    #[tokio::test]
    async fn test_rejected_tag_cannot_be_removed() {
        let manager = PostTagManager::new(setup_db().await);
        let tag = manager.create("p1", "bob", "alice").await.unwrap();

        manager.respond(tag.id, "bob", false).await.unwrap();
        assert!(manager.remove(tag.id, "alice", "alice").await.is_err());
    }
}
