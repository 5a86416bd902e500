//! Login state and flash messages, both kept in the session.

use argon2::{Algorithm, Argon2, Params, Version};
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Redirect, Response};
use log::{debug, info};
use quill_core::db::ConnectionMethods;
use quill_core::models::{Id, User};
use serde::{Deserialize, Serialize};
use tower_sessions::cookie::Key;
use tower_sessions::{Expiry, Session};

use crate::error::AppError;
use crate::state::AppState;

/// Session key holding the signed-in user's id.
pub const USER_KEY: &str = "user_id";
const FLASH_KEY: &str = "_flashes";
/// How long a "remember me" session survives without activity.
const REMEMBER_DAYS: i64 = 30;

/// Salt for stretching the configured secret into a cookie signing key.
const KEY_SALT: &[u8] = b"quill.session-cookie";
/// Bytes of key material cookie signing needs.
const KEY_LEN: usize = 64;

/// Derive the cookie signing key from the configured session secret.
pub fn signing_key(secret: &str) -> Result<Key, AppError> {
    let params = Params::new(8 * 1024, 2, 1, Some(KEY_LEN)).map_err(AppError::KeyDerivation)?;
    let mut material = [0u8; KEY_LEN];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password_into(secret.as_bytes(), KEY_SALT, &mut material)
        .map_err(AppError::KeyDerivation)?;
    Ok(Key::from(&material))
}

/// A one-shot message shown on the next rendered page.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Flash {
    /// Alert style: `success`, `info`, `warning` or `danger`.
    pub category: String,
    pub message: String,
}

/// Queue a flash message.
pub async fn flash(
    session: &Session,
    category: &str,
    message: impl Into<String>,
) -> Result<(), AppError> {
    let mut flashes: Vec<Flash> = session.get(FLASH_KEY).await?.unwrap_or_default();
    flashes.push(Flash {
        category: category.to_string(),
        message: message.into(),
    });
    session.insert(FLASH_KEY, flashes).await?;
    Ok(())
}

/// Remove and return the queued flash messages.
pub async fn take_flashes(session: &Session) -> Result<Vec<Flash>, AppError> {
    Ok(session
        .remove::<Vec<Flash>>(FLASH_KEY)
        .await?
        .unwrap_or_default())
}

/// Sign `user` in. A fresh session id is issued so an id handed out
/// before login cannot be reused.
pub async fn log_in(session: &Session, user: &User, remember: bool) -> Result<(), AppError> {
    session.cycle_id().await?;
    session.insert(USER_KEY, user.id).await?;
    if remember {
        session.set_expiry(Some(Expiry::OnInactivity(time::Duration::days(
            REMEMBER_DAYS,
        ))));
    }
    info!("user {} signed in", user.username);
    Ok(())
}

/// Forget everything stored for this session.
pub async fn log_out(session: &Session) -> Result<(), AppError> {
    session.flush().await?;
    Ok(())
}

/// Where to go after login. Only same-site paths are honoured.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

/// The login page, returning to `next` afterwards.
pub fn login_url(next: &str) -> Result<String, AppError> {
    Ok(format!(
        "/login?{}",
        serde_urlencoded::to_string([("next", next)])?
    ))
}

async fn session_of(parts: &mut Parts, state: &AppState) -> Result<Session, AppError> {
    Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| AppError::NoSessionLayer(msg))
}

/// The signed-in user, if any.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, AppError> {
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }
        let session = session_of(parts, state).await?;
        let Some(id) = session.get::<Id>(USER_KEY).await? else {
            return Ok(CurrentUser(None));
        };
        let user = state.with_conn(move |conn| conn.get_user(id)).await?;
        if user.is_none() {
            debug!("session refers to missing user {id}");
            session.remove::<Id>(USER_KEY).await?;
        }
        let current = CurrentUser(user);
        parts.extensions.insert(current.clone());
        Ok(current)
    }
}

/// The signed-in user. Anonymous requests are sent to the login page.
#[derive(Clone, Debug)]
pub struct AuthUser(pub User);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Response> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(CurrentUser(Some(user))) => Ok(AuthUser(user)),
            Ok(CurrentUser(None)) => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|p| p.as_str())
                    .unwrap_or("/")
                    .to_string();
                let redirect = async {
                    let session = session_of(parts, state).await?;
                    flash(&session, "info", "Please log in to access this page.").await?;
                    login_url(&next)
                };
                match redirect.await {
                    Ok(url) => Err(Redirect::to(&url).into_response()),
                    Err(e) => Err(e.into_response()),
                }
            }
            Err(e) => Err(e.into_response()),
        }
    }
}
