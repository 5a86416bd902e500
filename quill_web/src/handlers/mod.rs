//! Request handlers, grouped by area.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, Response};

use crate::error::{error_page, AppError};

pub mod auth;
pub mod blog;
pub mod taxonomy;

/// Render `template` into an HTML response body.
fn render(template: impl Template) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

/// Record ids in paths are integers; anything else names no page.
fn parse_id(raw: &str) -> Result<quill_core::Id, AppError> {
    raw.parse().map_err(|_| AppError::NotFound)
}

/// Fallback for unmatched routes.
pub async fn not_found() -> Response {
    error_page(StatusCode::NOT_FOUND)
}
