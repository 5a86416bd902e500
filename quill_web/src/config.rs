//! Runtime configuration read from the environment.

use std::env;
use std::path::PathBuf;

use log::{info, warn};
use quill_core::page::DEFAULT_PER_PAGE;

/// Secret used when `SESSION_SECRET` is unset. Only fit for development.
pub const DEFAULT_SECRET: &str = "dev-secret-key";
/// Database used when `DATABASE_URL` is unset.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://quill.db";
/// Listen address used when `QUILL_BIND` is unset.
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

/// Web application settings.
#[derive(Clone)]
pub struct Config {
    /// Key material for signing session cookies.
    pub session_secret: String,
    /// Connection URL, e.g. `sqlite://quill.db` or `docstore://blog.json`.
    pub database_url: String,
    /// Address the server listens on.
    pub bind: String,
    /// Posts per listing page.
    pub posts_per_page: u32,
    /// Mark the session cookie `Secure`. Enable behind HTTPS.
    pub secure_cookies: bool,
    /// Directory served under `/static`.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            session_secret: DEFAULT_SECRET.to_string(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            bind: DEFAULT_BIND.to_string(),
            posts_per_page: DEFAULT_PER_PAGE,
            secure_cookies: false,
            static_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/static")),
        }
    }
}

impl Config {
    /// Read `SESSION_SECRET`, `DATABASE_URL`, `QUILL_BIND`,
    /// `POSTS_PER_PAGE`, `QUILL_SECURE_COOKIES` and `QUILL_STATIC_DIR`,
    /// falling back to the defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        let session_secret = match env::var("SESSION_SECRET") {
            Ok(secret) if !secret.is_empty() => secret,
            _ => {
                warn!("SESSION_SECRET is not set - using the development secret");
                defaults.session_secret
            }
        };
        let posts_per_page = match env::var("POSTS_PER_PAGE") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    warn!("Ignoring invalid POSTS_PER_PAGE {raw:?}");
                    defaults.posts_per_page
                }
            },
            Err(_) => defaults.posts_per_page,
        };
        let secure_cookies = env::var("QUILL_SECURE_COOKIES")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);
        if secure_cookies {
            info!("Secure cookies enabled - cookies will only be sent over HTTPS");
        } else {
            warn!("Secure cookies disabled - set QUILL_SECURE_COOKIES=true for production");
        }
        Config {
            session_secret,
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind: env::var("QUILL_BIND").unwrap_or(defaults.bind),
            posts_per_page,
            secure_cookies,
            static_dir: env::var_os("QUILL_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.static_dir),
        }
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("session_secret", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("bind", &self.bind)
            .field("posts_per_page", &self.posts_per_page)
            .field("secure_cookies", &self.secure_cookies)
            .field("static_dir", &self.static_dir)
            .finish()
    }
}
