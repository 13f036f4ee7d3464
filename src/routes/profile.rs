use anyhow::Context;
use axum::{Extension, Json, extract::State, response::IntoResponse};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::router::OpenApiRouter;

use crate::{
    app_error::{AppError, StdResponse},
    app_state::AppState,
    middleware::{self, Caller},
    models::{ProfileEntity, UpdateProfileEntity},
};

/// The caller's own profile and session.
pub fn routes_with_openapi(state: &AppState) -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(utoipa_axum::routes!(get_profile, update_profile))
        .routes(utoipa_axum::routes!(sign_out))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::authenticate,
        ))
}

#[utoipa::path(
    get,
    path = "/profile",
    tags = ["Profile"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Get profile successfully", body = StdResponse<ProfileEntity, String>),
        (status = 403, description = "Profile row not created yet")
    )
)]
async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    let profile = state
        .profiles
        .find_profile(caller.user_id)
        .await
        .context("Failed to get profile")?
        .ok_or(AppError::NotFound)?;

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Get profile successfully"),
    })
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateProfileReq {
    pub full_name: String,
}

/// Change the caller's display name.
#[utoipa::path(
    patch,
    path = "/profile",
    tags = ["Profile"],
    security(("bearerAuth" = [])),
    request_body = UpdateProfileReq,
    responses(
        (status = 200, description = "Updated profile successfully", body = StdResponse<ProfileEntity, String>),
        (status = 400, description = "Empty name"),
        (status = 404, description = "Profile row not created yet")
    )
)]
async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Json(body): Json<UpdateProfileReq>,
) -> Result<impl IntoResponse, AppError> {
    let full_name = body.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::BadRequest("Full name is required".into()));
    }

    let profile = state
        .profiles
        .update_profile(
            caller.user_id,
            UpdateProfileEntity {
                full_name: Some(full_name),
                updated_at: Utc::now(),
            },
        )
        .await
        .context("Failed to update profile")?
        .ok_or(AppError::NotFound)?;

    state.profile_cache.invalidate(caller.user_id);

    Ok(StdResponse {
        data: Some(profile),
        message: Some("Update profile successfully"),
    })
}

/// End the caller's session at the identity provider.
#[utoipa::path(
    post,
    path = "/auth/sign-out",
    tags = ["Profile"],
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Signed out successfully", body = StdResponse<String, String>),
        (status = 502, description = "Identity provider unreachable")
    )
)]
async fn sign_out(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<impl IntoResponse, AppError> {
    state
        .identity
        .sign_out(&caller.token)
        .await
        .context("Failed to sign out")?;

    state.profile_cache.invalidate(caller.user_id);
    info!(user_id = %caller.user_id, "Signed out");

    Ok(StdResponse::<String, _> {
        data: None,
        message: Some("Sign out successfully"),
    })
}
