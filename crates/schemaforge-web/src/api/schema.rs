use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Json, Router,
};
use axum_extra::extract::CookieJar;
use schemaforge_core::merge_with_report;
use schemaforge_core::schema::EXPORT_FILE_NAME;
use schemaforge_core::{AttributeType, Edit, Schema, SchemaSlot};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session::{session_cookie, SessionToken};
use crate::state::AppState;

type ApiError = (StatusCode, String);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_schema).put(import_schema))
        .route("/export", get(export_schema))
        .route("/entities", post(add_entity))
        .route(
            "/entities/{entity}",
            patch(rename_entity).delete(remove_entity),
        )
        .route("/entities/{entity}/attributes", post(add_attribute))
        .route(
            "/entities/{entity}/attributes/{attribute}",
            patch(update_attribute).delete(remove_attribute),
        )
        .route("/selection/{entity}", put(select_entity))
}

#[derive(Debug, Serialize)]
pub struct SchemaView {
    pub schema: Schema,
    pub selected: usize,
    pub generation: u64,
    /// Name collisions and multi-key entities; reported, not rejected
    pub issues: Vec<String>,
}

impl SchemaView {
    fn of(slot: &SchemaSlot) -> Option<Self> {
        let editor = slot.editor()?;
        Some(Self {
            schema: editor.schema().clone(),
            selected: editor.selected(),
            generation: slot.generation(),
            issues: editor
                .schema()
                .validate()
                .iter()
                .map(ToString::to_string)
                .collect(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    #[serde(flatten)]
    pub view: SchemaView,
    /// Documents that failed the shape test and were skipped
    pub discarded: usize,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAttributeRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub attr_type: Option<AttributeType>,
    pub multi_value: Option<bool>,
    pub is_key: Option<bool>,
}

impl UpdateAttributeRequest {
    fn edits(self, entity: usize, attribute: usize) -> Vec<Edit> {
        let mut edits = Vec::new();
        if let Some(name) = self.name {
            edits.push(Edit::RenameAttribute {
                entity,
                attribute,
                name,
            });
        }
        if let Some(attr_type) = self.attr_type {
            edits.push(Edit::SetAttributeType {
                entity,
                attribute,
                attr_type,
            });
        }
        if let Some(multi_value) = self.multi_value {
            edits.push(Edit::SetMultiValue {
                entity,
                attribute,
                multi_value,
            });
        }
        if let Some(is_key) = self.is_key {
            edits.push(Edit::SetKey {
                entity,
                attribute,
                is_key,
            });
        }
        edits
    }
}

fn no_schema() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        "No schema loaded. Import documents or add an entity first.".to_string(),
    )
}

fn out_of_range() -> ApiError {
    (StatusCode::NOT_FOUND, "No such entity or attribute".to_string())
}

/// Applies `edits` in order to the session's schema.
async fn apply_edits(
    state: &AppState,
    session: &SessionToken,
    edits: &[Edit],
) -> Result<SchemaView, ApiError> {
    let mut manager = state.manager.write().await;
    let slot = &mut manager.get_or_create_session(session.0).slot;

    for edit in edits {
        match slot.apply(edit) {
            None => return Err(no_schema()),
            Some(false) => return Err(out_of_range()),
            Some(true) => tracing::debug!("Applied {:?}", edit),
        }
    }

    SchemaView::of(slot).ok_or_else(no_schema)
}

async fn get_schema(
    State(state): State<AppState>,
    session: SessionToken,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    let manager = state.manager.read().await;
    let view = manager
        .get_session(session.0)
        .and_then(|s| SchemaView::of(&s.slot))
        .ok_or_else(no_schema)?;

    Ok((jar.add(session_cookie(session.0)), Json(view)))
}

/// Merges the posted documents and replaces the session's schema with the
/// result. Earlier edits are discarded.
async fn import_schema(
    State(state): State<AppState>,
    session: SessionToken,
    jar: CookieJar,
    Json(documents): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    let report = merge_with_report(std::slice::from_ref(&documents));
    let discarded = report.discarded_count();

    let mut manager = state.manager.write().await;
    let slot = &mut manager.get_or_create_session(session.0).slot;
    slot.replace(report.schema);
    let view = SchemaView::of(slot).ok_or_else(no_schema)?;

    tracing::info!(
        "Session {} imported {} entities ({} discarded)",
        session.0,
        view.schema.entities.len(),
        discarded
    );

    Ok((
        jar.add(session_cookie(session.0)),
        Json(ImportResponse { view, discarded }),
    ))
}

async fn export_schema(
    State(state): State<AppState>,
    session: SessionToken,
) -> Result<Response, ApiError> {
    let manager = state.manager.read().await;
    let schema = manager
        .get_session(session.0)
        .and_then(|s| s.slot.current())
        .ok_or_else(no_schema)?;

    let body = schema
        .to_pretty_json()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
            ),
        ],
        body,
    )
        .into_response())
}

/// Starts an empty schema when the session has none yet.
async fn add_entity(
    State(state): State<AppState>,
    session: SessionToken,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    {
        let mut manager = state.manager.write().await;
        let slot = &mut manager.get_or_create_session(session.0).slot;
        if slot.current().is_none() {
            slot.replace(Schema::empty());
        }
    }

    let view = apply_edits(&state, &session, &[Edit::AddEntity]).await?;
    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(session.0)),
        Json(view),
    ))
}

async fn rename_entity(
    State(state): State<AppState>,
    session: SessionToken,
    Path(entity): Path<usize>,
    Json(req): Json<RenameRequest>,
) -> Result<Json<SchemaView>, ApiError> {
    let edit = Edit::RenameEntity {
        entity,
        name: req.name,
    };
    Ok(Json(apply_edits(&state, &session, &[edit]).await?))
}

async fn remove_entity(
    State(state): State<AppState>,
    session: SessionToken,
    Path(entity): Path<usize>,
) -> Result<Json<SchemaView>, ApiError> {
    let edit = Edit::RemoveEntity { entity };
    Ok(Json(apply_edits(&state, &session, &[edit]).await?))
}

async fn add_attribute(
    State(state): State<AppState>,
    session: SessionToken,
    Path(entity): Path<usize>,
) -> Result<impl IntoResponse, ApiError> {
    let view = apply_edits(&state, &session, &[Edit::AddAttribute { entity }]).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn update_attribute(
    State(state): State<AppState>,
    session: SessionToken,
    Path((entity, attribute)): Path<(usize, usize)>,
    Json(req): Json<UpdateAttributeRequest>,
) -> Result<Json<SchemaView>, ApiError> {
    let edits = req.edits(entity, attribute);
    if edits.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Nothing to update".to_string()));
    }
    Ok(Json(apply_edits(&state, &session, &edits).await?))
}

async fn remove_attribute(
    State(state): State<AppState>,
    session: SessionToken,
    Path((entity, attribute)): Path<(usize, usize)>,
) -> Result<Json<SchemaView>, ApiError> {
    let edit = Edit::RemoveAttribute { entity, attribute };
    Ok(Json(apply_edits(&state, &session, &[edit]).await?))
}

async fn select_entity(
    State(state): State<AppState>,
    session: SessionToken,
    Path(entity): Path<usize>,
) -> Result<Json<SchemaView>, ApiError> {
    let mut manager = state.manager.write().await;
    let slot = &mut manager.get_or_create_session(session.0).slot;
    let editor = slot.editor_mut().ok_or_else(no_schema)?;

    if !editor.select(entity) {
        return Err(out_of_range());
    }
    SchemaView::of(slot).map(Json).ok_or_else(no_schema)
}
