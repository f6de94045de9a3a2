//! Registration, login, profile and user administration

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use mta_common::security::{hash_password, validate_password, verify_password};
use mta_common::{Locale, Role, Tier};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::auth::{AdminUser, CurrentUser};
use crate::db::{sessions, users};
use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{Page, PageParams};
use crate::services::accounts;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
    pub locale: Option<Locale>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let user = accounts::register(
        &state.db,
        &req.email,
        &req.password,
        &req.display_name,
        req.locale.unwrap_or_default(),
    )
    .await?;
    let issued = accounts::create_session(&state.db, &user.id, state.settings().session_ttl_hours).await?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login(State(state): State<AppState>, Json(req): Json<LoginRequest>) -> ApiResult<Json<AuthResponse>> {
    let user = accounts::authenticate(&state.db, &req.email, &req.password).await?;
    let issued = accounts::create_session(&state.db, &user.id, state.settings().session_ttl_hours).await?;
    info!("User {} logged in", user.id);

    Ok(Json(AuthResponse {
        user,
        token: issued.token,
        expires_at: issued.expires_at,
    }))
}

/// POST /api/auth/logout
pub async fn logout(State(state): State<AppState>, CurrentUser(session): CurrentUser) -> ApiResult<StatusCode> {
    sessions::delete(&state.db, &session.token_hash).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub effective_tier: Tier,
}

/// GET /api/users/me
pub async fn me(CurrentUser(session): CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        user: session.user,
        effective_tier: session.tier,
    })
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub locale: Option<Locale>,
}

/// PATCH /api/users/me
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<MeResponse>> {
    let display_name = req
        .display_name
        .as_deref()
        .map(accounts::validate_display_name)
        .transpose()?;

    users::update_profile(&state.db, &session.user.id, display_name.as_deref(), req.locale).await?;
    let user = users::find_by_id(&state.db, &session.user.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(MeResponse {
        user,
        effective_tier: session.tier,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub sessions_revoked: u64,
}

/// POST /api/users/me/password
///
/// Every other session of the user is revoked; the calling one survives.
pub async fn change_password(
    State(state): State<AppState>,
    CurrentUser(session): CurrentUser,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ChangePasswordResponse>> {
    if !verify_password(&req.current_password, &session.user.password) {
        return Err(ApiError::BadRequest("Current password is incorrect".to_string()));
    }
    validate_password(&req.new_password)?;

    users::update_password(&state.db, &session.user.id, &hash_password(&req.new_password)).await?;
    let sessions_revoked = sessions::delete_others(&state.db, &session.user.id, &session.token_hash).await?;
    info!("User {} changed password, {} sessions revoked", session.user.id, sessions_revoked);

    Ok(Json(ChangePasswordResponse { sessions_revoked }))
}

#[derive(Debug, Default, Deserialize)]
pub struct UserSearch {
    pub q: Option<String>,
}

/// GET /api/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    Query(search): Query<UserSearch>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Page<User>>> {
    let q = search.q.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let total = users::count(&state.db, q).await?;
    let pagination = page.paginate(total);
    let items = users::list(&state.db, q, pagination.per_page, pagination.offset).await?;
    Ok(Json(Page::new(items, total, pagination)))
}

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

/// PATCH /api/admin/users/:id
pub async fn set_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> ApiResult<Json<User>> {
    if id == admin.user.id && req.role != Role::Admin {
        return Err(ApiError::BadRequest("Cannot remove your own admin role".to_string()));
    }
    if !users::set_role(&state.db, &id, req.role).await? {
        return Err(ApiError::NotFound(format!("User not found: {}", id)));
    }
    info!("User {} role set to {} by {}", id, req.role, admin.user.id);

    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;
    Ok(Json(user))
}

/// DELETE /api/admin/users/:id
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if id == admin.user.id {
        return Err(ApiError::BadRequest("Cannot delete your own account".to_string()));
    }
    if !users::delete(&state.db, &id).await? {
        return Err(ApiError::NotFound(format!("User not found: {}", id)));
    }
    info!("User {} deleted by {}", id, admin.user.id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/users/me", get(me).patch(update_me))
        .route("/api/users/me/password", post(change_password))
        .route("/api/admin/users", get(list_users))
        .route("/api/admin/users/:id", patch(set_role).delete(delete_user))
}
