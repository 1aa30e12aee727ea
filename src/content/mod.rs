/// Content store
///
/// Posts, comments, and chat messages, plus the loader that turns a stored
/// row and the target's moderation state into the effective `ContentFacts`
/// the decision engine consumes.
use crate::admin::Role;
use crate::error::{AppError, AppResult};
use crate::moderation::ModerationState;
use crate::policy;
use crate::tags;
use crate::visibility::{ContentFacts, DeletedSource, RuleKind, TargetType, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Post record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub visibility: Visibility,
    pub is_deleted: bool,
    pub is_hidden: bool,
    pub deleted_source: Option<DeletedSource>,
    pub created_at: DateTime<Utc>,
}

/// One entry of a CUSTOM visibility list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityRule {
    pub user_id: String,
    pub rule: RuleKind,
}

/// Content store
#[derive(Clone)]
pub struct ContentStore {
    db: SqlitePool,
}

impl ContentStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a post. Hashtags are extracted fail-soft and stored alongside;
    /// extraction can never block creation.
    pub async fn create_post(
        &self,
        author_id: &str,
        text: &str,
        visibility: Visibility,
        rules: &[VisibilityRule],
    ) -> AppResult<Post> {
        if visibility != Visibility::Custom && !rules.is_empty() {
            return Err(AppError::Validation(
                "Visibility rules are only valid for custom visibility".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let mut tx = self.db.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, text, visibility, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(author_id)
        .bind(text)
        .bind(visibility.as_str())
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for rule in rules {
            sqlx::query(
                r#"
                INSERT INTO post_visibility_rules (post_id, user_id, rule)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(&rule.user_id)
            .bind(rule.rule.as_str())
            .execute(&mut *tx)
            .await?;
        }

        for tag in tags::extract_hashtags(text) {
            sqlx::query("INSERT OR IGNORE INTO post_hashtags (post_id, tag) VALUES (?, ?)")
                .bind(&id)
                .bind(&tag)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Post {
            id,
            author_id: author_id.to_string(),
            text: text.to_string(),
            visibility,
            is_deleted: false,
            is_hidden: false,
            deleted_source: None,
            created_at: now,
        })
    }

    /// Create a comment on a post
    pub async fn create_comment(
        &self,
        post_id: &str,
        author_id: &str,
        text: &str,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO comments (id, post_id, author_id, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Create a chat message
    pub async fn create_chat_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        text: &str,
    ) -> AppResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO chat_messages (id, sender_id, recipient_id, text, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(sender_id)
        .bind(recipient_id)
        .bind(text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(id)
    }

    /// Get a post row as stored, moderation state not applied
    pub async fn get_post(&self, post_id: &str) -> AppResult<Option<Post>> {
        let row = sqlx::query(
            r#"
            SELECT id, author_id, text, visibility, is_deleted, is_hidden,
                   deleted_source, created_at
            FROM posts WHERE id = ?
            "#,
        )
        .bind(post_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| {
            let visibility = Visibility::from_str(&row.get::<String, _>("visibility"))?;
            let deleted_source = row
                .try_get::<Option<String>, _>("deleted_source")?
                .as_deref()
                .map(DeletedSource::from_str)
                .transpose()?;
            let created_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);

            Ok(Post {
                id: row.get("id"),
                author_id: row.get("author_id"),
                text: row.get("text"),
                visibility,
                is_deleted: row.get("is_deleted"),
                is_hidden: row.get("is_hidden"),
                deleted_source,
                created_at,
            })
        })
        .transpose()
    }

    /// Load the raw facts for any content kind, keyed by (type, id).
    /// Comments and chat messages have no visibility level of their own;
    /// they are treated as public and gated by the checks above the
    /// visibility switch.
    pub async fn load_facts(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<Option<ContentFacts>> {
        let row = match target_type {
            TargetType::Post => {
                sqlx::query(
                    r#"
                    SELECT id, author_id, visibility, is_deleted, is_hidden, deleted_source
                    FROM posts WHERE id = ?
                    "#,
                )
                .bind(target_id)
                .fetch_optional(&self.db)
                .await?
            }
            TargetType::Comment => {
                sqlx::query(
                    r#"
                    SELECT id, author_id, 'public' AS visibility, is_deleted, is_hidden, deleted_source
                    FROM comments WHERE id = ?
                    "#,
                )
                .bind(target_id)
                .fetch_optional(&self.db)
                .await?
            }
            TargetType::ChatMessage => {
                sqlx::query(
                    r#"
                    SELECT id, sender_id AS author_id, 'public' AS visibility,
                           is_deleted, is_hidden, deleted_source
                    FROM chat_messages WHERE id = ?
                    "#,
                )
                .bind(target_id)
                .fetch_optional(&self.db)
                .await?
            }
            TargetType::User => {
                return Err(AppError::Validation(
                    "Users are not a viewable content target".to_string(),
                ))
            }
        };

        row.map(|row| {
            let visibility = Visibility::from_str(&row.get::<String, _>("visibility"))?;
            let deleted_source = row
                .try_get::<Option<String>, _>("deleted_source")?
                .as_deref()
                .map(DeletedSource::from_str)
                .transpose()?;

            Ok(ContentFacts {
                id: row.get("id"),
                author_id: row.get("author_id"),
                kind: target_type,
                is_deleted: row.get("is_deleted"),
                is_hidden: row.get("is_hidden"),
                deleted_source,
                visibility,
            })
        })
        .transpose()
    }

    /// Change a post's visibility. Author or admin, and only while not
    /// deleted.
    pub async fn update_visibility(
        &self,
        post_id: &str,
        actor_id: &str,
        role: Option<Role>,
        visibility: Visibility,
        rules: &[VisibilityRule],
    ) -> AppResult<()> {
        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        policy::assert_owner_or_admin(actor_id, &post.author_id, role)?;

        if post.is_deleted {
            return Err(AppError::Conflict(
                "Cannot change visibility of deleted content".to_string(),
            ));
        }

        if visibility != Visibility::Custom && !rules.is_empty() {
            return Err(AppError::Validation(
                "Visibility rules are only valid for custom visibility".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;

        sqlx::query("UPDATE posts SET visibility = ? WHERE id = ?")
            .bind(visibility.as_str())
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        // Rule list is replaced wholesale, never merged
        sqlx::query("DELETE FROM post_visibility_rules WHERE post_id = ?")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;

        for rule in rules {
            sqlx::query(
                r#"
                INSERT INTO post_visibility_rules (post_id, user_id, rule)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(post_id)
            .bind(&rule.user_id)
            .bind(rule.rule.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    /// Soft-delete. Author or admin; the deletion source records which one
    /// removed it.
    pub async fn delete_post(
        &self,
        post_id: &str,
        actor_id: &str,
        role: Option<Role>,
    ) -> AppResult<()> {
        let post = self
            .get_post(post_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Post {} not found", post_id)))?;

        policy::assert_owner_or_admin(actor_id, &post.author_id, role)?;

        if post.is_deleted {
            return Err(AppError::Conflict("Post is already deleted".to_string()));
        }

        let source = if actor_id == post.author_id {
            DeletedSource::User
        } else {
            DeletedSource::Admin
        };

        sqlx::query("UPDATE posts SET is_deleted = 1, deleted_source = ? WHERE id = ?")
            .bind(source.as_str())
            .bind(post_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    /// Hashtags stored for a post
    pub async fn post_hashtags(&self, post_id: &str) -> AppResult<Vec<String>> {
        let tags = sqlx::query_scalar::<_, String>(
            "SELECT tag FROM post_hashtags WHERE post_id = ? ORDER BY tag",
        )
        .bind(post_id)
        .fetch_all(&self.db)
        .await?;

        Ok(tags)
    }
}

/// Overlay the target's moderation state onto its stored facts. A hide
/// action hides regardless of the stored flag; a force-visibility override
/// replaces the content's own level.
pub fn apply_moderation(mut facts: ContentFacts, state: &ModerationState) -> ContentFacts {
    if state.hidden {
        facts.is_hidden = true;
    }
    if let Some(level) = state.forced_visibility {
        facts.visibility = level;
    }
    facts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::visibility;

    async fn setup_db() -> SqlitePool {
        let db = SqlitePool::connect(":memory:").await.unwrap();
        for ddl in [
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
            r#"
            CREATE TABLE comments (
                id TEXT PRIMARY KEY,
                post_id TEXT NOT NULL,
                author_id TEXT NOT NULL,
                text TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                is_hidden INTEGER NOT NULL DEFAULT 0,
                deleted_source TEXT,
                created_at TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE post_visibility_rules (
                post_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                rule TEXT NOT NULL,
                PRIMARY KEY (post_id, user_id)
            )
            "#,
            "CREATE TABLE post_hashtags (post_id TEXT NOT NULL, tag TEXT NOT NULL, PRIMARY KEY (post_id, tag))",
        ] {
            sqlx::query(ddl).execute(&db).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_create_post_extracts_hashtags() {
        let store = ContentStore::new(setup_db().await);

        let post = store
            .create_post("alice", "shipping #Rust and #rust today", Visibility::Public, &[])
            .await
            .unwrap();

        let tags = store.post_hashtags(&post.id).await.unwrap();
        assert_eq!(tags, vec!["rust"]);
    }

    #[tokio::test]
    async fn test_visibility_rules_require_custom() {
        let store = ContentStore::new(setup_db().await);

        let rules = vec![VisibilityRule {
            user_id: "bob".to_string(),
            rule: RuleKind::Include,
        }];
        assert!(store
            .create_post("alice", "hi", Visibility::Public, &rules)
            .await
            .is_err());
        assert!(store
            .create_post("alice", "hi", Visibility::Custom, &rules)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_only_author_updates_visibility() {
        let store = ContentStore::new(setup_db().await);
        let post = store
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();

        assert!(store
            .update_visibility(&post.id, "bob", None, Visibility::Private, &[])
            .await
            .is_err());
        store
            .update_visibility(&post.id, "alice", None, Visibility::Private, &[])
            .await
            .unwrap();

        let facts = store
            .load_facts(TargetType::Post, &post.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(facts.visibility, Visibility::Private);
    }

    #[tokio::test]
    async fn test_deleted_post_visibility_is_frozen() {
        let store = ContentStore::new(setup_db().await);
        let post = store
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();

        store.delete_post(&post.id, "alice", None).await.unwrap();
        assert!(store
            .update_visibility(&post.id, "alice", None, Visibility::Private, &[])
            .await
            .is_err());

        let facts = store
            .load_facts(TargetType::Post, &post.id)
            .await
            .unwrap()
            .unwrap();
        assert!(facts.is_deleted);
        assert_eq!(facts.deleted_source, Some(DeletedSource::User));
        assert_eq!(
            visibility::decide(Some(&facts), &Default::default()),
            visibility::Decision::PostDeleted
        );
    }

    #[tokio::test]
    async fn test_admin_bypasses_ownership() {
        let store = ContentStore::new(setup_db().await);
        let post = store
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();

        // Moderators can look but not touch
        assert!(store
            .update_visibility(&post.id, "mod1", Some(Role::Moderator), Visibility::Private, &[])
            .await
            .is_err());
        store
            .update_visibility(&post.id, "adm1", Some(Role::Admin), Visibility::Private, &[])
            .await
            .unwrap();

        store
            .delete_post(&post.id, "adm1", Some(Role::Admin))
            .await
            .unwrap();
        let facts = store
            .load_facts(TargetType::Post, &post.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(facts.deleted_source, Some(DeletedSource::Admin));
    }

    #[tokio::test]
    async fn test_comment_facts_load_as_public() {
        let store = ContentStore::new(setup_db().await);
        let post = store
            .create_post("alice", "hi", Visibility::Public, &[])
            .await
            .unwrap();
        let comment_id = store.create_comment(&post.id, "bob", "hello").await.unwrap();

        let facts = store
            .load_facts(TargetType::Comment, &comment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(facts.author_id, "bob");
        assert_eq!(facts.visibility, Visibility::Public);
    }

    #[test]
    fn test_apply_moderation_overlay() {
        let facts = ContentFacts {
            id: "p1".to_string(),
            author_id: "alice".to_string(),
            kind: TargetType::Post,
            is_deleted: false,
            is_hidden: false,
            deleted_source: None,
            visibility: Visibility::Public,
        };

        let state = ModerationState {
            hidden: true,
            banned: false,
            forced_visibility: Some(Visibility::Private),
            latest_action_id: Some(7),
        };

        let effective = apply_moderation(facts, &state);
        assert!(effective.is_hidden);
        assert_eq!(effective.visibility, Visibility::Private);
    }
}
