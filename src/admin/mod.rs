/// Admin role management and audit logging
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

/// Admin role levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Can view only, no actions
    Moderator,
    /// Can perform most admin actions
    Admin,
    /// Full access, can grant/revoke roles
    SuperAdmin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Moderator => "moderator",
            Role::Admin => "admin",
            Role::SuperAdmin => "superadmin",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "moderator" => Ok(Role::Moderator),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::SuperAdmin),
            _ => Err(AppError::Validation(format!("Invalid role: {}", s))),
        }
    }

    /// Check if this role can perform actions requiring another role
    pub fn can_act_as(&self, required: Role) -> bool {
        self >= &required
    }
}

/// Admin role record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminRole {
    pub id: i64,
    pub user_id: String,
    pub role: Role,
    pub granted_by: Option<String>,
    pub granted_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Admin role manager
#[derive(Clone)]
pub struct AdminRoleManager {
    db: SqlitePool,
}

impl AdminRoleManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Grant an admin role to a user
    pub async fn grant_role(
        &self,
        user_id: &str,
        role: Role,
        granted_by: &str,
    ) -> AppResult<AdminRole> {
        let now = Utc::now();

        if let Some(existing) = self.get_role(user_id).await? {
            return Err(AppError::Conflict(format!(
                "User already has active role: {}",
                existing.as_str()
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO admin_roles (user_id, role, granted_by, granted_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(user_id)
        .bind(role.as_str())
        .bind(granted_by)
        .bind(now.to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(AdminRole {
            id: result.last_insert_rowid(),
            user_id: user_id.to_string(),
            role,
            granted_by: Some(granted_by.to_string()),
            granted_at: now,
            revoked: false,
        })
    }

    /// Revoke a user's admin role
    pub async fn revoke_role(&self, user_id: &str, revoked_by: &str) -> AppResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE admin_roles
            SET revoked = 1, revoked_at = ?, revoked_by = ?
            WHERE user_id = ? AND revoked = 0
            "#,
        )
        .bind(now.to_rfc3339())
        .bind(revoked_by)
        .bind(user_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!(
                "No active role for user {}",
                user_id
            )));
        }

        Ok(())
    }

    /// Get the active role for a user, if any
    pub async fn get_role(&self, user_id: &str) -> AppResult<Option<Role>> {
        let row = sqlx::query(
            r#"
            SELECT role FROM admin_roles
            WHERE user_id = ? AND revoked = 0
            ORDER BY granted_at DESC
            LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        match row {
            Some(row) => {
                let role_str: String = row.get("role");
                Ok(Some(Role::from_str(&role_str)?))
            }
            None => Ok(None),
        }
    }

    /// Record an admin action in the audit log
    pub async fn log_action(
        &self,
        admin_id: &str,
        action: &str,
        target_type: Option<&str>,
        target_id: Option<&str>,
        detail: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_audit_log (admin_id, action, target_type, target_id, detail, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(admin_id)
        .bind(action)
        .bind(target_type)
        .bind(target_id)
        .bind(detail)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        Ok(())
    }
}
