mod schema;
mod session;
mod webhook;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/schema", schema::router())
        .nest("/session", session::router())
        .nest("/webhook", webhook::router())
}
