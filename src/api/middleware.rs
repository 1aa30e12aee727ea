/// Viewer extraction
///
/// Session mechanics live outside this service: the boundary in front of it
/// resolves the session and forwards the viewer id in the `x-viewer-id`
/// header. The viewer is always an explicit value threaded through handlers,
/// never ambient state. Admin-ness comes from the role table, not a header.
use crate::{admin::Role, context::AppContext, error::AppError};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

pub const VIEWER_HEADER: &str = "x-viewer-id";

/// Possibly-anonymous viewer
#[derive(Debug, Clone)]
pub struct Viewer {
    pub id: Option<String>,
    pub role: Option<Role>,
}

impl Viewer {
    pub fn is_admin(&self) -> bool {
        self.role.map_or(false, |r| r.can_act_as(Role::Admin))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for Viewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(VIEWER_HEADER)
            .and_then(|h| h.to_str().ok())
            .filter(|s| !s.is_empty())
            .map(String::from);

        let role = match &id {
            Some(id) => state.admin_roles.get_role(id).await?,
            None => None,
        };

        Ok(Viewer { id, role })
    }
}

/// Viewer required for mutating endpoints
#[derive(Debug, Clone)]
pub struct AuthedViewer {
    pub id: String,
    pub role: Option<Role>,
}

impl AuthedViewer {
    pub fn is_admin(&self) -> bool {
        self.role.map_or(false, |r| r.can_act_as(Role::Admin))
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AuthedViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let viewer = Viewer::from_request_parts(parts, state).await?;
        let id = viewer.id.ok_or(AppError::Forbidden)?;

        Ok(AuthedViewer {
            id,
            role: viewer.role,
        })
    }
}

/// Viewer holding any admin role. Handlers check the ladder for actions
/// that need more than moderator access.
#[derive(Debug, Clone)]
pub struct AdminViewer {
    pub id: String,
    pub role: Role,
}

impl AdminViewer {
    pub fn require(&self, required: Role) -> Result<(), AppError> {
        if self.role.can_act_as(required) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl FromRequestParts<AppContext> for AdminViewer {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        let viewer = AuthedViewer::from_request_parts(parts, state).await?;
        let role = viewer.role.ok_or(AppError::Forbidden)?;

        Ok(AdminViewer {
            id: viewer.id,
            role,
        })
    }
}
