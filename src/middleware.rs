//! Authentication and role guards shared by every protected router.

use anyhow::Context;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::{app_error::AppError, app_state::AppState, role::Role};

/// The authenticated caller, inserted as a request extension by
/// [`authenticate`].
#[derive(Debug, Clone)]
pub struct Caller {
    pub user_id: Uuid,
    pub role: Role,
    pub token: String,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Resolves the bearer token through the identity provider and the caller's
/// role through the profile cache, falling back to the profiles table.
/// Callers without a profile row are refused.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let user_id = state
        .identity
        .current_user(&token)
        .await
        .context("Failed to resolve caller")?
        .ok_or(AppError::Unauthorized)?;

    let role = resolve_role(&state, user_id).await?;

    req.extensions_mut().insert(Caller {
        user_id,
        role,
        token,
    });

    Ok(next.run(req).await)
}

async fn resolve_role(state: &AppState, user_id: Uuid) -> Result<Role, AppError> {
    if let Some(role) = state.profile_cache.get(user_id) {
        return Ok(role);
    }

    let profile = state
        .profiles
        .find_profile(user_id)
        .await
        .context("Failed to get caller profile")?;

    match profile {
        Some(profile) => {
            state.profile_cache.insert(user_id, profile.role);
            Ok(profile.role)
        }
        None => {
            // The sign-up trigger has not written the row yet.
            warn!(%user_id, "No profile row for authenticated user");
            Err(AppError::ForbiddenResource(
                "Profile not ready, please try again shortly".into(),
            ))
        }
    }
}

/// Roles admitted by [`require_role`].
#[derive(Debug, Clone, Copy)]
pub struct RoleGuard(pub &'static [Role]);

impl RoleGuard {
    pub const ADMIN: RoleGuard = RoleGuard(&[Role::Admin]);
    pub const PRODUCER: RoleGuard = RoleGuard(&[Role::Producer, Role::Admin]);
}

/// Must run inside [`authenticate`].
pub async fn require_role(
    State(guard): State<RoleGuard>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let role = req
        .extensions()
        .get::<Caller>()
        .map(|caller| caller.role)
        .ok_or(AppError::Unauthorized)?;

    if !guard.0.contains(&role) {
        return Err(AppError::ForbiddenResource(format!(
            "Role {role} may not access this resource"
        )));
    }

    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }

    Some(token)
}
