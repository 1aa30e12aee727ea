/// Policy Assertion Layer
///
/// Small, independent guards invoked before mutating operations. Each guard
/// evaluates a fixed, ordered list of preconditions and fails on the first
/// violated one. Denials carry only a coarse category: the boundary renders
/// every category as the same generic 403 so account state cannot be
/// enumerated from error strings.
use crate::admin::Role;
use crate::error::AppError;

/// Denial categories. Deliberately coarse; the specific precondition that
/// failed is logged server-side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyDenial {
    AccountState,
    NotOwner,
    SelfTarget,
    ReservedName,
}

impl PolicyDenial {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyDenial::AccountState => "account_state",
            PolicyDenial::NotOwner => "not_owner",
            PolicyDenial::SelfTarget => "self_target",
            PolicyDenial::ReservedName => "reserved_name",
        }
    }
}

impl From<PolicyDenial> for AppError {
    fn from(denial: PolicyDenial) -> Self {
        tracing::debug!(category = denial.as_str(), "policy denial");
        AppError::Forbidden
    }
}

/// Account standing flags consumed by the account-state guard
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountStanding {
    pub is_disabled: bool,
    pub is_banned: bool,
    pub is_locked: bool,
}

/// Deny when the account is disabled, banned, or locked, checked in that
/// fixed order. Used before password reset, username change, contact
/// changes, avatar updates, profile export, and tag-setting changes.
pub fn assert_account_active(standing: &AccountStanding) -> Result<(), PolicyDenial> {
    if standing.is_disabled {
        return Err(PolicyDenial::AccountState);
    }
    if standing.is_banned {
        return Err(PolicyDenial::AccountState);
    }
    if standing.is_locked {
        return Err(PolicyDenial::AccountState);
    }
    Ok(())
}

/// Deny when the actor does not own the resource
pub fn assert_owner(actor_id: &str, owner_id: &str) -> Result<(), PolicyDenial> {
    if actor_id != owner_id {
        return Err(PolicyDenial::NotOwner);
    }
    Ok(())
}

/// Ownership guard with an admin bypass (comment delete, moderation tooling)
pub fn assert_owner_or_admin(
    actor_id: &str,
    owner_id: &str,
    role: Option<Role>,
) -> Result<(), PolicyDenial> {
    if actor_id == owner_id {
        return Ok(());
    }
    if role.map_or(false, |r| r.can_act_as(Role::Admin)) {
        return Ok(());
    }
    Err(PolicyDenial::NotOwner)
}

/// Deny reporting or blocking oneself
pub fn assert_not_self(actor_id: &str, target_id: &str) -> Result<(), PolicyDenial> {
    if actor_id == target_id {
        return Err(PolicyDenial::SelfTarget);
    }
    Ok(())
}

/// Usernames that can never be registered, independent of availability
const RESERVED_USERNAMES: &[&str] = &[
    "admin",
    "administrator",
    "moderator",
    "root",
    "support",
    "system",
    "help",
    "about",
    "api",
    "official",
];

const RESERVED_PREFIXES: &[&str] = &["admin_", "sys_"];

/// Deny usernames in the reserved set or carrying a reserved prefix
pub fn assert_username_allowed(name: &str) -> Result<(), PolicyDenial> {
    let normalized = name.to_lowercase();
    if RESERVED_USERNAMES.contains(&normalized.as_str()) {
        return Err(PolicyDenial::ReservedName);
    }
    if RESERVED_PREFIXES.iter().any(|p| normalized.starts_with(p)) {
        return Err(PolicyDenial::ReservedName);
    }
    Ok(())
}
