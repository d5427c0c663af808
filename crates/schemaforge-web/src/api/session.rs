use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use axum_extra::extract::CookieJar;
use serde::Serialize;
use uuid::Uuid;

use crate::session::{session_cookie, SessionToken};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_session))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub has_schema: bool,
    pub generation: u64,
    pub created_at: String,
}

async fn get_session(
    State(state): State<AppState>,
    session: SessionToken,
    jar: CookieJar,
) -> impl IntoResponse {
    let manager = state.manager.read().await;

    let response = manager.get_session(session.0).map_or(
        SessionResponse {
            session_id: session.0,
            has_schema: false,
            generation: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
        },
        |s| SessionResponse {
            session_id: s.id,
            has_schema: s.slot.current().is_some(),
            generation: s.slot.generation(),
            created_at: s.created_at.to_rfc3339(),
        },
    );

    // Ensure session cookie is set
    let jar = jar.add(session_cookie(session.0));

    (jar, Json(response))
}
