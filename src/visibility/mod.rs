/// Visibility Decision Engine
///
/// Pure decision logic for whether a viewer may see a content item. Combines
/// the item's own visibility configuration with pre-fetched relationship and
/// moderation facts. Has no side effects and never touches the database:
/// callers assemble `ContentFacts` and `ViewerFacts` first, then call
/// [`decide`] (read paths) or [`decide_manage`] (edit/delete paths).
use crate::error::{AppError, AppResult};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// What a decision or moderation action is about. `User` appears only as a
/// moderation target (bans); the decision engine works on content kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Post,
    Comment,
    ChatMessage,
    User,
}

impl TargetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetType::Post => "post",
            TargetType::Comment => "comment",
            TargetType::ChatMessage => "chat_message",
            TargetType::User => "user",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "post" => Ok(TargetType::Post),
            "comment" => Ok(TargetType::Comment),
            "chat_message" => Ok(TargetType::ChatMessage),
            "user" => Ok(TargetType::User),
            _ => Err(AppError::Validation(format!("Invalid target type: {}", s))),
        }
    }
}

/// Post visibility levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Followers,
    Private,
    Custom,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Followers => "followers",
            Visibility::Private => "private",
            Visibility::Custom => "custom",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "public" => Ok(Visibility::Public),
            "followers" => Ok(Visibility::Followers),
            "private" => Ok(Visibility::Private),
            "custom" => Ok(Visibility::Custom),
            _ => Err(AppError::Validation(format!("Invalid visibility: {}", s))),
        }
    }
}

/// Who removed a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeletedSource {
    User,
    Admin,
    System,
}

impl DeletedSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletedSource::User => "user",
            DeletedSource::Admin => "admin",
            DeletedSource::System => "system",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "user" => Ok(DeletedSource::User),
            "admin" => Ok(DeletedSource::Admin),
            "system" => Ok(DeletedSource::System),
            _ => Err(AppError::Validation(format!("Invalid deleted source: {}", s))),
        }
    }
}

/// Per-viewer rule on a CUSTOM-visibility post. Stored as a single tagged
/// list rather than two separate id lists, so include and exclude cannot
/// disagree for the same viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Include,
    Exclude,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Include => "include",
            RuleKind::Exclude => "exclude",
        }
    }

    pub fn from_str(s: &str) -> AppResult<Self> {
        match s.to_lowercase().as_str() {
            "include" => Ok(RuleKind::Include),
            "exclude" => Ok(RuleKind::Exclude),
            _ => Err(AppError::Validation(format!("Invalid rule kind: {}", s))),
        }
    }
}

/// Facts about the content item under decision. `visibility` is the
/// effective level: a moderation force-visibility override has already been
/// applied by the caller, and `is_hidden` includes moderation hides.
#[derive(Debug, Clone)]
pub struct ContentFacts {
    pub id: String,
    pub author_id: String,
    pub kind: TargetType,
    pub is_deleted: bool,
    pub is_hidden: bool,
    pub deleted_source: Option<DeletedSource>,
    pub visibility: Visibility,
}

/// Facts about the viewer-author pair, pre-fetched by the caller
#[derive(Debug, Clone, Default)]
pub struct ViewerFacts {
    pub is_owner: bool,
    pub is_follower: bool,
    /// A block in either direction between viewer and author
    pub blocked_either: bool,
    pub is_admin: bool,
    /// Explicit rule for this viewer on a CUSTOM post, if any
    pub custom_rule: Option<RuleKind>,
}

/// Closed set of visibility outcomes. Every input combination maps to
/// exactly one value; there is no unknown or thrown-error outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Ok,
    NotFound,
    PostDeleted,
    PostHidden,
    Blocked,
    VisibilityDenied,
    NotFollower,
    AccountPrivate,
    NotOwner,
}

impl Decision {
    pub fn is_ok(&self) -> bool {
        matches!(self, Decision::Ok)
    }

    /// Degrade follow-graph detail for callers that must not reveal it
    /// (share links, search results).
    pub fn coarse(self) -> Decision {
        match self {
            Decision::NotFollower => Decision::VisibilityDenied,
            other => other,
        }
    }

    /// Non-owners must not be able to distinguish moderated content from
    /// absent content.
    pub fn masked(self, is_owner: bool) -> Decision {
        match self {
            Decision::PostDeleted | Decision::PostHidden if !is_owner => Decision::NotFound,
            other => other,
        }
    }

    pub fn http_status(&self) -> StatusCode {
        match self {
            Decision::Ok => StatusCode::OK,
            Decision::NotFound | Decision::PostDeleted | Decision::PostHidden => {
                StatusCode::NOT_FOUND
            }
            Decision::Blocked
            | Decision::VisibilityDenied
            | Decision::NotFollower
            | Decision::AccountPrivate
            | Decision::NotOwner => StatusCode::FORBIDDEN,
        }
    }
}

/// Decide whether the viewer may see the content item.
///
/// Precedence, each step short-circuiting:
/// absent, deleted, hidden, block (either direction), ownership, explicit
/// exclude rule, then the visibility level itself. Ownership bypasses the
/// visibility rules but never the delete/hidden/block checks above it, so
/// owners see their own moderated content as hidden and a block cannot be
/// escaped through an ownership claim. An exclude rule beats PUBLIC: the
/// explicit per-viewer signal is stronger than the coarse level.
pub fn decide(content: Option<&ContentFacts>, viewer: &ViewerFacts) -> Decision {
    let content = match content {
        Some(c) => c,
        None => return Decision::NotFound,
    };

    if content.is_deleted {
        return Decision::PostDeleted;
    }

    if content.is_hidden {
        return Decision::PostHidden;
    }

    if viewer.blocked_either {
        return Decision::Blocked;
    }

    if viewer.is_owner {
        return Decision::Ok;
    }

    if viewer.custom_rule == Some(RuleKind::Exclude) {
        return Decision::VisibilityDenied;
    }

    match content.visibility {
        Visibility::Public => Decision::Ok,
        Visibility::Followers => {
            if viewer.is_follower {
                Decision::Ok
            } else {
                Decision::NotFollower
            }
        }
        Visibility::Custom => {
            if viewer.custom_rule == Some(RuleKind::Include) {
                Decision::Ok
            } else {
                Decision::VisibilityDenied
            }
        }
        Visibility::Private => Decision::AccountPrivate,
    }
}

/// Decide whether the viewer may edit or delete the content item.
///
/// Same absent/deleted/hidden/block gate as [`decide`], then ownership is
/// required rather than merely sufficient. Admins bypass the ownership
/// requirement (moderation tooling), not the gates above it.
pub fn decide_manage(content: Option<&ContentFacts>, viewer: &ViewerFacts) -> Decision {
    let content = match content {
        Some(c) => c,
        None => return Decision::NotFound,
    };

    if content.is_deleted {
        return Decision::PostDeleted;
    }

    if content.is_hidden && !viewer.is_admin {
        return Decision::PostHidden;
    }

    if viewer.blocked_either {
        return Decision::Blocked;
    }

    if viewer.is_owner || viewer.is_admin {
        return Decision::Ok;
    }

    Decision::NotOwner
}
