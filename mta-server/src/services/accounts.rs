//! Registration, login and sessions

use chrono::{DateTime, Duration, Utc};
use mta_common::security::{self, hash_password, hash_token, normalize_email, validate_password, verify_password};
use mta_common::{Locale, Role};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::users::{self, NewUser, User};
use crate::db::sessions;
use crate::error::{ApiError, ApiResult};

/// Same message for unknown email and wrong password
const BAD_CREDENTIALS: &str = "Invalid email or password";

const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// A freshly issued bearer token; only its hash is stored
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub async fn create_session(pool: &SqlitePool, user_id: &str, ttl_hours: i64) -> sqlx::Result<IssuedToken> {
    let token = security::generate_token();
    let expires_at = mta_common::time::now() + Duration::hours(ttl_hours);
    sessions::create(pool, &hash_token(&token), user_id, expires_at).await?;
    Ok(IssuedToken { token, expires_at })
}

pub fn validate_display_name(name: &str) -> ApiResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("Display name is required".to_string()));
    }
    if name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Display name exceeds {} characters",
            MAX_DISPLAY_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

pub async fn register(
    pool: &SqlitePool,
    email: &str,
    password: &str,
    display_name: &str,
    locale: Locale,
) -> ApiResult<User> {
    let email = normalize_email(email)?;
    validate_password(password)?;
    let display_name = validate_display_name(display_name)?;

    if users::find_by_email(pool, &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let user = users::create(
        pool,
        NewUser {
            email: &email,
            display_name: &display_name,
            password: hash_password(password),
            role: Role::Student,
            locale,
        },
    )
    .await?;

    info!("Registered user {}", user.id);
    Ok(user)
}

pub async fn authenticate(pool: &SqlitePool, email: &str, password: &str) -> ApiResult<User> {
    let unauthorized = || ApiError::Unauthorized(BAD_CREDENTIALS.to_string());
    let email = normalize_email(email).map_err(|_| unauthorized())?;

    let user = users::find_by_email(pool, &email).await?.ok_or_else(unauthorized)?;
    if !verify_password(password, &user.password) {
        return Err(unauthorized());
    }
    Ok(user)
}

/// Resolve a bearer token to its user; expired sessions are deleted
pub async fn resolve_token(pool: &SqlitePool, token: &str) -> ApiResult<User> {
    let token_hash = hash_token(token);
    let (user, expires_at) = sessions::find(pool, &token_hash)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid session token".to_string()))?;

    if expires_at <= mta_common::time::now() {
        sessions::delete(pool, &token_hash).await?;
        return Err(ApiError::Unauthorized("Session expired".to_string()));
    }
    Ok(user)
}

/// Create the first admin when none exists
///
/// Returns the created admin, or `None` when an admin already exists.
/// An existing student with the same email is promoted instead.
pub async fn bootstrap_admin(pool: &SqlitePool, email: &str, password: &str) -> ApiResult<Option<User>> {
    if !users::admin_ids(pool).await?.is_empty() {
        return Ok(None);
    }

    let email = normalize_email(email)?;
    if let Some(existing) = users::find_by_email(pool, &email).await? {
        warn!("Promoting existing user {} to admin", existing.id);
        users::set_role(pool, &existing.id, Role::Admin).await?;
        return Ok(users::find_by_id(pool, &existing.id).await?);
    }

    validate_password(password)?;
    let user = users::create(
        pool,
        NewUser {
            email: &email,
            display_name: "Administrator",
            password: hash_password(password),
            role: Role::Admin,
            locale: Locale::default(),
        },
    )
    .await?;

    info!("Created bootstrap admin {}", user.email);
    Ok(Some(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool() -> SqlitePool {
        mta_common::db::connect_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let pool = pool().await;
        let user = register(&pool, "  Ana@Example.MD ", "masaj2024", "Ana", Locale::Ro)
            .await
            .unwrap();
        assert_eq!(user.email, "ana@example.md");
        assert_eq!(user.role, Role::Student);

        assert!(authenticate(&pool, "ana@example.md", "masaj2024").await.is_ok());
        assert!(matches!(
            authenticate(&pool, "ana@example.md", "wrong1234").await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            authenticate(&pool, "nobody@example.md", "masaj2024").await,
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts() {
        let pool = pool().await;
        register(&pool, "ana@example.md", "masaj2024", "Ana", Locale::Ro).await.unwrap();
        assert!(matches!(
            register(&pool, "ANA@example.md", "masaj2024", "Ana 2", Locale::Ru).await,
            Err(ApiError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_deleted() {
        let pool = pool().await;
        let user = register(&pool, "ion@example.md", "masaj2024", "Ion", Locale::Ro).await.unwrap();

        let issued = create_session(&pool, &user.id, 1).await.unwrap();
        assert_eq!(resolve_token(&pool, &issued.token).await.unwrap().id, user.id);

        let past = mta_common::time::now() - Duration::hours(1);
        sessions::create(&pool, &hash_token("stale"), &user.id, past).await.unwrap();
        assert!(matches!(
            resolve_token(&pool, "stale").await,
            Err(ApiError::Unauthorized(_))
        ));
        assert!(sessions::find(&pool, &hash_token("stale")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bootstrap_admin_runs_once() {
        let pool = pool().await;
        let admin = bootstrap_admin(&pool, "admin@example.md", "admin12345").await.unwrap();
        assert_eq!(admin.unwrap().role, Role::Admin);
        assert!(bootstrap_admin(&pool, "other@example.md", "admin12345").await.unwrap().is_none());
    }
}
