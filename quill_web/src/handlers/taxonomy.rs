//! JSON endpoints for creating categories and tags from the post form.

use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use log::error;
use quill_core::forms::{CategoryForm, TagForm};
use quill_core::{actions, Error, Id};
use serde_json::json;

use crate::error::{describe, AppError};
use crate::session::AuthUser;
use crate::state::AppState;

fn reply(result: Result<(Id, String), AppError>) -> Response {
    match result {
        Ok((id, name)) => Json(json!({ "success": true, "id": id, "name": name })).into_response(),
        Err(AppError::Core(Error::Validation(errors))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "errors": errors })),
        )
            .into_response(),
        Err(e) => {
            let status = e.status();
            if status.is_server_error() {
                error!("{e}");
            }
            let (_, message) = describe(status);
            (status, Json(json!({ "success": false, "error": message }))).into_response()
        }
    }
}

pub async fn add_category(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Form(form): Form<CategoryForm>,
) -> Response {
    let result = state
        .with_conn(move |conn| actions::add_category(conn, &form))
        .await;
    if let Ok(category) = &result {
        log::info!("{} added category {}", user.username, category.name);
    }
    reply(result.map(|c| (c.id, c.name)))
}

pub async fn add_tag(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Form(form): Form<TagForm>,
) -> Response {
    let result = state
        .with_conn(move |conn| actions::add_tag(conn, &form))
        .await;
    if let Ok(tag) = &result {
        log::info!("{} added tag {}", user.username, tag.name);
    }
    reply(result.map(|t| (t.id, t.name)))
}
