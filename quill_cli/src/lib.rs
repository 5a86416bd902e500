#![doc(hidden)]
//! Implementation of the `quill` command.
//!
//! Every command takes the directory holding the saved connection
//! (normally `.quill` under the working directory) so it can be driven
//! from tests as well as from `main`.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail};
use log::info;
use quill_core::db::{self, BackendConnection, Connection, ConnectionSpec};
use quill_core::{actions, migrations, User};
use quill_web::{AppState, Config};

pub type Result<T> = std::result::Result<T, anyhow::Error>;

/// Name of the directory `init` writes the connection spec into.
pub const BASE_DIR_NAME: &str = ".quill";

/// `.quill` under the current working directory.
pub fn base_dir() -> Result<PathBuf> {
    std::env::current_dir()
        .map(|d| d.join(BASE_DIR_NAME))
        .map_err(|e| e.into())
}

/// Check that `connstr` can be opened with `backend` and remember both.
pub fn init(base_dir: &Path, backend: &str, connstr: &str) -> Result<ConnectionSpec> {
    if db::get_backend(backend).is_none() {
        bail!("Unknown backend {backend}");
    }
    let spec = ConnectionSpec::new(backend, connstr);
    db::connect(&spec)?; // ensure we can
    std::fs::create_dir_all(base_dir)?;
    spec.save(base_dir)?;
    info!("saved connection to {}", base_dir.display());
    Ok(spec)
}

/// The connection saved by [`init`].
pub fn load_connspec(base_dir: &Path) -> Result<ConnectionSpec> {
    match ConnectionSpec::load(base_dir) {
        Ok(spec) => Ok(spec),
        Err(quill_core::Error::IO(_)) => {
            bail!("No Quill connection info found. Did you run quill init?")
        }
        Err(e) => Err(e.into()),
    }
}

fn connect(base_dir: &Path) -> Result<Connection> {
    Ok(db::connect(&load_connspec(base_dir)?)?)
}

/// Apply pending migrations. Returns how many were applied.
pub fn migrate(base_dir: &Path) -> Result<usize> {
    let conn = connect(base_dir)?;
    let to_apply = migrations::unapplied(&conn)?;
    println!("{} migrations to apply", to_apply.len());
    for m in &to_apply {
        println!("Applying migration {}", m.name);
    }
    Ok(migrations::migrate(&conn)?)
}

/// With no name, undo the latest migration. Otherwise roll back until
/// `to` is the latest applied migration.
pub fn rollback(base_dir: &Path, to: Option<&str>) -> Result<()> {
    let conn = connect(base_dir)?;
    match to {
        Some(name) => {
            let count = migrations::rollback_to(&conn, name)?;
            if count == 0 {
                eprintln!("{name} is the latest migration, nothing to roll back.");
            } else {
                println!("Rolled back {count} migrations");
            }
        }
        None => match migrations::rollback_latest(&conn)? {
            Some(name) => println!("Rolled back migration {name}"),
            None => bail!("No migrations applied!"),
        },
    }
    Ok(())
}

/// Every migration of the connected backend with whether it is applied.
pub fn migration_status(conn: &impl BackendConnection) -> Result<Vec<(&'static str, bool)>> {
    let applied = migrations::applied(conn)?;
    Ok(migrations::all(conn.backend_name())
        .iter()
        .map(|m| (m.name, applied.iter().any(|a| a == m.name)))
        .collect())
}

pub fn list_migrations(base_dir: &Path) -> Result<()> {
    let conn = connect(base_dir)?;
    let status = migration_status(&conn)?;
    if status.is_empty() {
        println!("The {} backend has no migrations", conn.backend_name());
    }
    for (name, applied) in status {
        let m_state = match applied {
            true => "applied",
            false => "not applied",
        };
        println!("Migration '{name}' ({m_state})");
    }
    Ok(())
}

/// Grant `username` admin rights, or take them away.
pub fn admin(base_dir: &Path, username: &str, revoke: bool) -> Result<User> {
    let conn = connect(base_dir)?;
    let user = actions::set_admin(&conn, username, !revoke).map_err(|e| match e {
        quill_core::Error::NoSuchObject => anyhow!("No user named {username}"),
        e => e.into(),
    })?;
    match user.is_admin {
        true => println!("{} is now an admin", user.username),
        false => println!("{} is no longer an admin", user.username),
    }
    Ok(user)
}

/// Settings for `serve`. A database URL or bind address given on the
/// command line (or via its environment variable) wins over the
/// connection saved by `init`, which wins over the defaults.
pub fn serve_config(
    base_dir: &Path,
    database_url: Option<String>,
    bind: Option<String>,
) -> Result<Config> {
    let mut config = Config::from_env();
    match database_url {
        Some(url) => config.database_url = url,
        None => {
            if let Ok(spec) = ConnectionSpec::load(base_dir) {
                config.database_url = spec.to_url();
            }
        }
    }
    if let Some(bind) = bind {
        config.bind = bind;
    }
    Ok(config)
}

/// Migrate the database and run the web server until interrupted.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::connect(config)?;
    {
        let conn = state.pool().get()?;
        let applied = migrations::migrate(&*conn)?;
        if applied > 0 {
            info!("applied {applied} migrations");
        }
    }
    quill_web::serve(state).await?;
    Ok(())
}

pub fn handle_error(r: Result<()>) {
    if let Err(e) = r {
        eprintln!("Encountered unexpected error: {e}");
        std::process::exit(1);
    }
}
