/// Account records and standing flags
///
/// A thin user store: registration with reserved-name enforcement and the
/// standing flags (disabled/banned/locked) the policy guards consume.
/// Authentication and session mechanics live outside this service.
use crate::error::{AppError, AppResult};
use crate::policy::{self, AccountStanding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// User record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub handle: String,
    pub is_disabled: bool,
    pub is_banned: bool,
    pub is_locked: bool,
    pub created_at: DateTime<Utc>,
}

/// Account manager
#[derive(Clone)]
pub struct AccountManager {
    db: SqlitePool,
}

impl AccountManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Create a user. Reserved handles are refused before the availability
    /// check so the two cannot be told apart by timing the error.
    pub async fn create_user(&self, handle: &str) -> AppResult<User> {
        policy::assert_username_allowed(handle)?;

        if handle.is_empty() || handle.len() > 64 {
            return Err(AppError::Validation(
                "Handle must be between 1 and 64 characters".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO users (id, handle, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(handle)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("Handle {} is taken", handle))
            }
            _ => AppError::Database(e),
        })?;

        Ok(User {
            id,
            handle: handle.to_string(),
            is_disabled: false,
            is_banned: false,
            is_locked: false,
            created_at: now,
        })
    }

    /// Get a user by id
    pub async fn get_user(&self, user_id: &str) -> AppResult<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT id, handle, is_disabled, is_banned, is_locked, created_at
            FROM users WHERE id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(|row| {
            let created_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))?
                .with_timezone(&Utc);

            Ok(User {
                id: row.get("id"),
                handle: row.get("handle"),
                is_disabled: row.get("is_disabled"),
                is_banned: row.get("is_banned"),
                is_locked: row.get("is_locked"),
                created_at,
            })
        })
        .transpose()
    }

    /// Standing flags for the policy guards
    pub async fn standing(&self, user_id: &str) -> AppResult<AccountStanding> {
        let user = self
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        Ok(AccountStanding {
            is_disabled: user.is_disabled,
            is_banned: user.is_banned,
            is_locked: user.is_locked,
        })
    }

    /// Set a standing flag (admin tooling)
    pub async fn set_banned(&self, user_id: &str, banned: bool) -> AppResult<()> {
        let result = sqlx::query("UPDATE users SET is_banned = ? WHERE id = ?")
            .bind(banned)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

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
            CREATE TABLE users (
                id TEXT PRIMARY KEY,
                handle TEXT NOT NULL UNIQUE,
                is_disabled INTEGER NOT NULL DEFAULT 0,
                is_banned INTEGER NOT NULL DEFAULT 0,
                is_locked INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&db)
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_and_fetch_user() {
        let manager = AccountManager::new(setup_db().await);

        let user = manager.create_user("carol").await.unwrap();
        let fetched = manager.get_user(&user.id).await.unwrap().unwrap();
        assert_eq!(fetched.handle, "carol");

        let standing = manager.standing(&user.id).await.unwrap();
        assert!(!standing.is_banned);
    }

    #[tokio::test]
    async fn test_reserved_handle_refused() {
        let manager = AccountManager::new(setup_db().await);
        assert!(manager.create_user("admin").await.is_err());
        assert!(manager.create_user("sys_ops").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_handle_conflicts() {
        let manager = AccountManager::new(setup_db().await);
        manager.create_user("carol").await.unwrap();
        assert!(matches!(
            manager.create_user("carol").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_ban_flag_feeds_standing() {
        let manager = AccountManager::new(setup_db().await);
        let user = manager.create_user("carol").await.unwrap();

        manager.set_banned(&user.id, true).await.unwrap();
        let standing = manager.standing(&user.id).await.unwrap();
        assert!(standing.is_banned);
        assert!(crate::policy::assert_account_active(&standing).is_err());
    }
}
