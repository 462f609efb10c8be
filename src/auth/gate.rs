//! Request extractors that gate routes on a valid session.
//!
//! The token is read from `Authorization: Bearer <token>` or, failing
//! that, from the `agridash_session` cookie.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::Utc;
use std::sync::Arc;

use super::token::{verify_token, SessionClaims};
use crate::error::AppError;
use crate::models::Role;
use crate::server::state::AppState;

pub const SESSION_COOKIE: &str = "agridash_session";

/// Any signed-in user.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub SessionClaims);

/// A user with at least the manager role.
#[derive(Debug, Clone)]
pub struct ManagerUser(pub SessionClaims);

/// A user with the admin role.
#[derive(Debug, Clone)]
pub struct AdminUser(pub SessionClaims);

impl CurrentUser {
    pub fn id(&self) -> i64 {
        self.0.sub
    }

    pub fn role(&self) -> Role {
        self.0.role
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

fn cookie_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

fn require_role(claims: SessionClaims, required: Role) -> Result<SessionClaims, AppError> {
    if claims.role.allows(required) {
        Ok(claims)
    } else {
        tracing::debug!(user_id = claims.sub, role = %claims.role, %required, "Access denied");
        Err(AppError::Forbidden(format!("{} role required", required)))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| cookie_token(parts))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
        let claims = verify_token(&state.keys, token, Utc::now())?;
        Ok(CurrentUser(claims))
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ManagerUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;
        require_role(claims, Role::Manager).map(ManagerUser)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(claims) = CurrentUser::from_request_parts(parts, state).await?;
        require_role(claims, Role::Admin).map(AdminUser)
    }
}
