//! Extract the caller's session from the `Authorization: Bearer` header.

use crate::error::AppError;
use crate::session::Session;
use crate::state::AppState;
use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Bearer token from the Authorization header, if present and non-empty.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer ").or_else(|| s.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A verified, unexpired session. Rejects with 401 otherwise.
#[derive(Clone, Debug)]
pub struct AuthSession(pub Session);

#[async_trait]
impl FromRequestParts<AppState> for AuthSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?;
        let session = state.identity.verify(token)?;
        session.ensure_active()?;
        Ok(AuthSession(session))
    }
}

/// Like [`AuthSession`] but never rejects; used by the console route gate.
#[derive(Clone, Debug)]
pub struct OptionalSession(pub Option<Session>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = bearer_token(parts)
            .and_then(|t| state.identity.verify(t).ok())
            .filter(|s| !s.is_expired());
        Ok(OptionalSession(session))
    }
}
