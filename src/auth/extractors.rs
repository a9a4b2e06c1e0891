use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;

use super::{
    services::resolve_user,
    session::{token_from, Session},
};
use crate::{error::AppError, policy, state::AppState, store::records::User};

/// Session cookie token plus the live session behind it, if any. Never rejects.
pub struct CurrentSession {
    pub token: Option<String>,
    pub session: Option<Session>,
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = token_from(&jar);
        let session = token.as_deref().and_then(|t| state.sessions.get(t));
        Ok(Self { token, session })
    }
}

impl CurrentSession {
    pub fn user(&self, state: &AppState) -> Option<User> {
        self.session
            .as_ref()
            .and_then(|s| s.user_id.as_deref())
            .and_then(|id| resolve_user(&state.store, id))
    }
}

/// Logged-in, non-suspended user behind the session cookie.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentSession::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        let user = current.user(state).ok_or(AppError::Unauthenticated)?;
        policy::ensure_not_suspended(&user)?;
        Ok(AuthUser(user))
    }
}

/// Session that has been unlocked with the admin code.
pub struct AdminSession;

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let current = CurrentSession::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});
        policy::ensure_admin(current.session.as_ref())?;
        Ok(AdminSession)
    }
}
