//! Request failures and the error pages they render as.

use askama::Template;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use log::{debug, error};
use thiserror::Error as ThisError;

use crate::templates::ErrorTemplate;
use crate::views::BaseContext;

/// Anything a handler can fail with.
#[derive(Debug, ThisError)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] quill_core::Error),
    #[error("Page not found")]
    NotFound,
    #[error("Template error {0}")]
    Render(#[from] askama::Error),
    #[error("Session error {0}")]
    Session(#[from] tower_sessions::session::Error),
    #[error("Session layer missing: {0}")]
    NoSessionLayer(&'static str),
    #[error("Blocking task failed {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("Query string encoding error {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),
    #[error("Session key derivation failed {0}")]
    KeyDerivation(argon2::Error),
    #[error("IO error {0}")]
    IO(#[from] std::io::Error),
}

impl AppError {
    /// The status the error page is served with.
    pub fn status(&self) -> StatusCode {
        use quill_core::Error;
        match self {
            AppError::NotFound | AppError::Core(Error::NoSuchObject) => StatusCode::NOT_FOUND,
            AppError::Core(Error::NotAuthorized) => StatusCode::FORBIDDEN,
            AppError::Core(Error::Validation(_)) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Heading and explanation shown for `status`.
pub fn describe(status: StatusCode) -> (&'static str, &'static str) {
    match status {
        StatusCode::NOT_FOUND => ("Page Not Found", "Page not found"),
        StatusCode::FORBIDDEN => (
            "Forbidden",
            "You do not have permission to access this resource",
        ),
        StatusCode::BAD_REQUEST => ("Bad Request", "The submitted data was not valid"),
        _ => ("Server Error", "Internal server error"),
    }
}

/// Render the HTML error page for `status`.
pub fn error_page(status: StatusCode) -> Response {
    let (title, message) = describe(status);
    let template = ErrorTemplate {
        ctx: BaseContext::default(),
        title,
        code: status.as_u16(),
        message,
    };
    match template.render() {
        Ok(body) => (status, Html(body)).into_response(),
        Err(e) => {
            error!("Failed to render error template: {e:?}");
            (status, message).into_response()
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{self}");
        } else {
            debug!("request rejected with {status}: {self}");
        }
        error_page(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{Error, FormErrors};

    #[test]
    fn status_mapping() {
        assert_eq!(
            AppError::from(Error::NoSuchObject).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(Error::NotAuthorized).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AppError::from(Error::Validation(FormErrors::new())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(Error::Internal("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn forbidden_page_text() {
        let (title, message) = describe(StatusCode::FORBIDDEN);
        assert_eq!(title, "Forbidden");
        assert_eq!(message, "You do not have permission to access this resource");
    }
}
