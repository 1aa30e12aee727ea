/// Moderation State Provider
///
/// Tracks admin-issued actions against users and content items. Actions are
/// immutable once created; reversal is recorded in dedicated columns rather
/// than by deleting history. The current moderation state of a target is the
/// effect of its most recent unreversed actions, not a history replay.
use crate::error::{AppError, AppResult};
use crate::visibility::{TargetType, Visibility};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqliteConnection, SqlitePool};

/// Moderation action types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Ban the target user from the service
    Ban,
    /// Remove content from public view without deleting it
    Hide,
    /// Mark for review, no user-visible effect
    Flag,
    /// Override the content's own visibility level
    ForceVisibility,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Ban => "ban",
            ActionType::Hide => "hide",
            ActionType::Flag => "flag",
            ActionType::ForceVisibility => "force_visibility",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "ban" => Ok(ActionType::Ban),
            "hide" => Ok(ActionType::Hide),
            "flag" => Ok(ActionType::Flag),
            "force_visibility" => Ok(ActionType::ForceVisibility),
            _ => Err(AppError::Validation(format!(
                "Invalid moderation action: {}",
                s
            ))),
        }
    }
}

/// Flag severity for review queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagSeverity {
    Low,
    Medium,
    High,
}

/// Per-action metadata as a closed tagged union keyed by action type.
/// Serialized into the `detail` JSON column; unknown shapes are rejected at
/// the boundary rather than stored as a free-form bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDetail {
    Ban {
        expires_at: Option<DateTime<Utc>>,
    },
    Hide {},
    Flag {
        severity: FlagSeverity,
    },
    ForceVisibility {
        level: Visibility,
    },
}

impl ActionDetail {
    pub fn action_type(&self) -> ActionType {
        match self {
            ActionDetail::Ban { .. } => ActionType::Ban,
            ActionDetail::Hide {} => ActionType::Hide,
            ActionDetail::Flag { .. } => ActionType::Flag,
            ActionDetail::ForceVisibility { .. } => ActionType::ForceVisibility,
        }
    }
}

/// Moderation action record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationAction {
    pub id: i64,
    pub action_type: ActionType,
    pub target_type: TargetType,
    pub target_id: String,
    pub reason: String,
    pub detail: ActionDetail,
    pub actor_id: String,
    pub created_at: DateTime<Utc>,
    pub reversed: bool,
    pub reversed_at: Option<DateTime<Utc>>,
    pub reversed_by: Option<String>,
}

/// Current moderation state of a target, derived from its most recent
/// unreversed actions
#[derive(Debug, Clone, Default)]
pub struct ModerationState {
    pub hidden: bool,
    pub banned: bool,
    pub forced_visibility: Option<Visibility>,
    /// Most recent unreversed action, the one an appeal would contest
    pub latest_action_id: Option<i64>,
}

/// Moderation manager
#[derive(Clone)]
pub struct ModerationManager {
    db: SqlitePool,
}

impl ModerationManager {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Apply a moderation action to a target
    pub async fn apply_action(
        &self,
        target_type: TargetType,
        target_id: &str,
        detail: ActionDetail,
        reason: &str,
        actor_id: &str,
    ) -> AppResult<ModerationAction> {
        let now = Utc::now();
        let action_type = detail.action_type();
        let detail_json = serde_json::to_string(&detail)
            .map_err(|e| AppError::Internal(format!("Failed to encode action detail: {}", e)))?;

        let mut tx = self.db.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO moderation_actions
            (action_type, target_type, target_id, reason, detail, actor_id, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(action_type.as_str())
        .bind(target_type.as_str())
        .bind(target_id)
        .bind(reason)
        .bind(&detail_json)
        .bind(actor_id)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        // A hide action is reflected on the content row so feed queries can
        // filter without consulting the action table.
        if action_type == ActionType::Hide {
            set_hidden_flag(&mut tx, target_type, target_id, true).await?;
        }

        tx.commit().await?;

        tracing::info!(
            action = action_type.as_str(),
            target = target_id,
            actor = actor_id,
            "moderation action applied"
        );

        Ok(ModerationAction {
            id: result.last_insert_rowid(),
            action_type,
            target_type,
            target_id: target_id.to_string(),
            reason: reason.to_string(),
            detail,
            actor_id: actor_id.to_string(),
            created_at: now,
            reversed: false,
            reversed_at: None,
            reversed_by: None,
        })
    }

    /// Reverse a moderation action and reinstate its effect
    pub async fn reverse_action(&self, action_id: i64, reversed_by: &str) -> AppResult<()> {
        let mut tx = self.db.begin().await?;
        reverse_action_tx(&mut tx, action_id, reversed_by).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Most recent unreversed action for a target, if any
    pub async fn latest_action(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<Option<ModerationAction>> {
        let row = sqlx::query(
            r#"
            SELECT id, action_type, target_type, target_id, reason, detail,
                   actor_id, created_at, reversed, reversed_at, reversed_by
            FROM moderation_actions
            WHERE target_type = ? AND target_id = ? AND reversed = 0
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_optional(&self.db)
        .await?;

        row.map(parse_action).transpose()
    }

    /// Derive the current moderation state of a target.
    ///
    /// For each concern (hide, ban, visibility override) the most recent
    /// unreversed action of that kind wins; reversed actions contribute
    /// nothing.
    pub async fn state_for(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<ModerationState> {
        let rows = sqlx::query(
            r#"
            SELECT id, action_type, target_type, target_id, reason, detail,
                   actor_id, created_at, reversed, reversed_at, reversed_by
            FROM moderation_actions
            WHERE target_type = ? AND target_id = ? AND reversed = 0
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_all(&self.db)
        .await?;

        let now = Utc::now();
        let mut state = ModerationState::default();

        for row in rows {
            let action = parse_action(row)?;
            if state.latest_action_id.is_none() {
                state.latest_action_id = Some(action.id);
            }
            match &action.detail {
                ActionDetail::Hide {} => state.hidden = true,
                ActionDetail::Ban { expires_at } => {
                    if expires_at.map_or(true, |exp| exp > now) {
                        state.banned = true;
                    }
                }
                ActionDetail::ForceVisibility { level } => {
                    if state.forced_visibility.is_none() {
                        state.forced_visibility = Some(*level);
                    }
                }
                ActionDetail::Flag { .. } => {}
            }
        }

        Ok(state)
    }

    /// Full action history for a target, newest first
    pub async fn history(
        &self,
        target_type: TargetType,
        target_id: &str,
    ) -> AppResult<Vec<ModerationAction>> {
        let rows = sqlx::query(
            r#"
            SELECT id, action_type, target_type, target_id, reason, detail,
                   actor_id, created_at, reversed, reversed_at, reversed_by
            FROM moderation_actions
            WHERE target_type = ? AND target_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(target_type.as_str())
        .bind(target_id)
        .fetch_all(&self.db)
        .await?;

        rows.into_iter().map(parse_action).collect()
    }
}

/// Reverse an action inside an existing transaction. Used directly by
/// appeal approval so the appeal resolution and the reinstatement cannot
/// observably diverge.
pub async fn reverse_action_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    action_id: i64,
    reversed_by: &str,
) -> AppResult<()> {
    let now = Utc::now();

    let row = sqlx::query(
        r#"
        SELECT action_type, target_type, target_id FROM moderation_actions
        WHERE id = ? AND reversed = 0
        "#,
    )
    .bind(action_id)
    .fetch_optional(&mut **tx)
    .await?;

    let row = row.ok_or_else(|| {
        AppError::NotFound(format!(
            "Moderation action {} not found or already reversed",
            action_id
        ))
    })?;

    let action_type = ActionType::from_str(&row.get::<String, _>("action_type"))?;
    let target_type = TargetType::from_str(&row.get::<String, _>("target_type"))?;
    let target_id: String = row.get("target_id");

    sqlx::query(
        r#"
        UPDATE moderation_actions
        SET reversed = 1, reversed_at = ?, reversed_by = ?
        WHERE id = ?
        "#,
    )
    .bind(now.to_rfc3339())
    .bind(reversed_by)
    .bind(action_id)
    .execute(&mut **tx)
    .await?;

    if action_type == ActionType::Hide {
        set_hidden_flag(tx, target_type, &target_id, false).await?;
    }

    Ok(())
}

/// Set or clear the hidden flag on the underlying content row
async fn set_hidden_flag(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    target_type: TargetType,
    target_id: &str,
    hidden: bool,
) -> AppResult<()> {
    let table = match target_type {
        TargetType::Post => "posts",
        TargetType::Comment => "comments",
        TargetType::ChatMessage => "chat_messages",
        // User targets carry no hidden flag; ban state lives in the action table
        TargetType::User => return Ok(()),
    };
    let conn: &mut SqliteConnection = &mut *tx;

    sqlx::query(&format!("UPDATE {} SET is_hidden = ? WHERE id = ?", table))
        .bind(hidden)
        .bind(target_id)
        .execute(conn)
        .await?;

    Ok(())
}

fn parse_action(row: sqlx::sqlite::SqliteRow) -> AppResult<ModerationAction> {
    let action_type = ActionType::from_str(&row.get::<String, _>("action_type"))?;
    let target_type = TargetType::from_str(&row.get::<String, _>("target_type"))?;

    let detail_json: String = row.get("detail");
    let detail: ActionDetail = serde_json::from_str(&detail_json)
        .map_err(|e| AppError::Internal(format!("Invalid action detail: {}", e)))?;

    let created_at = parse_timestamp(&row.get::<String, _>("created_at"))?;
    let reversed_at = row
        .try_get::<String, _>("reversed_at")
        .ok()
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc));

    Ok(ModerationAction {
        id: row.get("id"),
        action_type,
        target_type,
        target_id: row.get("target_id"),
        reason: row.get("reason"),
        detail,
        actor_id: row.get("actor_id"),
        created_at,
        reversed: row.get("reversed"),
        reversed_at,
        reversed_by: row.get("reversed_by"),
    })
}

fn parse_timestamp(s: &str) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| AppError::Internal(format!("Invalid timestamp: {}", e)))
}
