//! HTTP front end for the Quill blog.
//!
//! [`app`] assembles the axum router: HTML pages rendered with askama,
//! sessions held by `tower-sessions` in signed cookies, flash messages,
//! two small JSON endpoints, static assets and an access log. [`serve`]
//! binds it to the configured address.

use axum::http::{header, HeaderValue};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use log::info;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{MemoryStore, SessionManagerLayer};

pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod session;
pub mod state;
pub mod templates;
pub mod views;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;

use handlers::{auth, blog, taxonomy};

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "quill-session";

/// Build the application router.
pub fn app(state: AppState) -> Result<Router, AppError> {
    let config = state.config();
    let key = session::signing_key(&config.session_secret)?;
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookies)
        .with_same_site(SameSite::Lax)
        .with_name(SESSION_COOKIE)
        .with_http_only(true)
        .with_signed(key);
    let static_dir = ServeDir::new(&config.static_dir);

    Ok(Router::new()
        .route("/", get(blog::index))
        .route("/login", get(auth::login_page).post(auth::login))
        .route("/register", get(auth::register_page).post(auth::register))
        .route("/logout", get(auth::logout))
        .route("/profile", get(blog::dashboard).post(auth::edit_profile))
        .route(
            "/edit-profile",
            get(auth::edit_profile_page).post(auth::edit_profile),
        )
        .route("/delete-account", post(auth::delete_account))
        .route("/dashboard", get(blog::dashboard))
        .route("/post/new", get(blog::new_post_page).post(blog::new_post))
        .route("/post/{slug}", get(blog::view_post).post(blog::add_comment))
        .route(
            "/post/{slug}/edit",
            get(blog::edit_post_page).post(blog::edit_post),
        )
        .route("/post/{slug}/delete", post(blog::delete_post))
        .route("/comment/{id}/delete", post(blog::delete_comment))
        .route("/category/add", post(taxonomy::add_category))
        .route("/category/{id}", get(blog::category_posts))
        .route("/tag/add", post(taxonomy::add_tag))
        .route("/tag/{id}", get(blog::tag_posts))
        .nest_service("/static", static_dir)
        .fallback(handlers::not_found)
        .layer(session_layer)
        .layer(middleware::from_fn(logging::log_requests))
        // Security headers
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .with_state(state))
}

/// Serve the application until interrupted.
pub async fn serve(state: AppState) -> Result<(), AppError> {
    let bind = state.config().bind.clone();
    let router = app(state)?;
    let listener = TcpListener::bind(&bind).await?;
    info!("Quill running on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Quill stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {e}");
    }
}
