//! Bearer-token sessions
//!
//! [`session_layer`] resolves the `Authorization` header once per request
//! and stores the [`Session`] as a request extension. Handlers opt in to
//! authentication through the [`CurrentUser`], [`AdminUser`] and [`Viewer`]
//! extractors.
//!
//! A token that does not resolve leaves the request anonymous, so public
//! routes (login, health, catalog) still answer. The reason is kept as a
//! [`SessionRejected`] extension and reported by [`CurrentUser`].

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use mta_common::security::hash_token;
use mta_common::{Role, Tier};
use tracing::debug;

use crate::db::users::User;
use crate::error::{ApiError, ApiResult};
use crate::services::{access, accounts};
use crate::AppState;

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    /// Stored hash of the presented token
    pub token_hash: String,
    /// Effective tier at request time
    pub tier: Tier,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.user.role == Role::Admin
    }
}

fn bearer_token(headers: &HeaderMap) -> ApiResult<Option<&str>> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let value = value
        .to_str()
        .map_err(|_| ApiError::Unauthorized("Invalid authorization header".to_string()))?;
    let token = value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Expected a Bearer token".to_string()))?;
    Ok(Some(token))
}

async fn resolve(state: &AppState, headers: &HeaderMap) -> ApiResult<Option<Session>> {
    let Some(token) = bearer_token(headers)? else {
        return Ok(None);
    };
    let user = accounts::resolve_token(&state.db, token).await?;
    let tier = access::effective_tier(&state.db, &user.id, user.role, mta_common::time::now()).await?;
    Ok(Some(Session {
        user,
        token_hash: hash_token(token),
        tier,
    }))
}

/// Why a presented token did not produce a session
#[derive(Debug, Clone)]
pub struct SessionRejected(pub String);

/// Middleware: attach the caller's session, if any
pub async fn session_layer(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    match resolve(&state, request.headers()).await {
        Ok(Some(session)) => {
            request.extensions_mut().insert(session);
        }
        Ok(None) => {}
        Err(ApiError::Unauthorized(reason)) => {
            debug!("Treating request as anonymous: {}", reason);
            request.extensions_mut().insert(SessionRejected(reason));
        }
        Err(e) => return e.into_response(),
    }
    next.run(request).await
}

/// Requires a session
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(CurrentUser(session.clone()));
        }
        let reason = parts
            .extensions
            .get::<SessionRejected>()
            .map_or_else(|| "Authentication required".to_string(), |r| r.0.clone());
        Err(ApiError::Unauthorized(reason))
    }
}

/// Requires an admin session
#[derive(Debug, Clone)]
pub struct AdminUser(pub Session);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(session) = CurrentUser::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            return Err(ApiError::Forbidden("Administrator access required".to_string()));
        }
        Ok(AdminUser(session))
    }
}

/// Optional session, for endpoints that anonymous visitors may call
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<Session>);

impl Viewer {
    pub fn tier(&self) -> Tier {
        self.0.as_ref().map_or(Tier::Free, |s| s.tier)
    }

    pub fn is_admin(&self) -> bool {
        self.0.as_ref().is_some_and(Session::is_admin)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.0.as_ref().map(|s| s.user.id.as_str())
    }

    pub fn can_access(&self, required: Tier) -> bool {
        mta_common::tier::can_access(self.tier(), required)
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(parts.extensions.get::<Session>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers).unwrap(), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers).unwrap(), Some("abc123"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc123"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }

    #[test]
    fn test_anonymous_viewer_is_free() {
        let viewer = Viewer(None);
        assert_eq!(viewer.tier(), Tier::Free);
        assert!(!viewer.is_admin());
        assert!(viewer.can_access(Tier::Free));
        assert!(!viewer.can_access(Tier::Basic));
    }
}
