use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use axum_extra::extract::cookie::{Cookie, SameSite};
use axum_extra::extract::CookieJar;
use uuid::Uuid;

use crate::state::{AppState, SessionId};

pub const SESSION_COOKIE_NAME: &str = "schemaforge_session";

/// Extractor that provides the session ID from cookies
///
/// Creates a new session if the cookie is missing or unknown
pub struct SessionToken(pub SessionId);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .map_err(|_| (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read cookies"))?;

        let session_id = jar
            .get(SESSION_COOKIE_NAME)
            .and_then(|cookie| cookie.value().parse::<Uuid>().ok())
            .unwrap_or_else(Uuid::new_v4);

        state.manager.write().await.get_or_create_session(session_id);

        Ok(Self(session_id))
    }
}

/// Cookie to set on response for new sessions
pub fn session_cookie(session_id: SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE_NAME, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .build()
}
