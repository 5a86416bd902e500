//! Versioned schema migrations.
//!
//! Each backend has an ordered list of [`Migration`]s. Applying one runs
//! its `up` script and records its name; rolling back runs `down` and
//! forgets the name. The document store has no schema, so its list is
//! empty and every operation here is a no-op for it.

use crate::db::{BackendConnection, ConnectionMethods};
use crate::{Error, Result};

/// A named pair of schema scripts.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Migration {
    /// Unique name, recorded once applied.
    pub name: &'static str,
    /// Script applying the migration.
    pub up: &'static str,
    /// Script reverting it.
    pub down: &'static str,
}

const SQLITE_MIGRATIONS: &[Migration] = &[
    Migration {
        name: "20240301_000000_init",
        up: r#"
CREATE TABLE users (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    bio TEXT,
    joined_at TEXT NOT NULL,
    last_login TEXT NOT NULL,
    is_admin INTEGER NOT NULL DEFAULT 0
);
CREATE TABLE categories (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT
);
CREATE TABLE tags (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE posts (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    slug TEXT NOT NULL UNIQUE,
    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    category_id INTEGER REFERENCES categories(id) ON DELETE SET NULL,
    published INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE post_tags (
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (post_id, tag_id)
);
CREATE TABLE comments (
    id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
    body TEXT NOT NULL,
    author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    parent_id INTEGER REFERENCES comments(id) ON DELETE CASCADE,
    approved INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#,
        down: r#"
DROP TABLE comments;
DROP TABLE post_tags;
DROP TABLE posts;
DROP TABLE tags;
DROP TABLE categories;
DROP TABLE users;
"#,
    },
    Migration {
        name: "20240315_000000_listing_indexes",
        up: r#"
CREATE INDEX posts_created_at ON posts (created_at DESC, id DESC);
CREATE INDEX comments_post_id ON comments (post_id);
CREATE INDEX post_tags_tag_id ON post_tags (tag_id);
"#,
        down: r#"
DROP INDEX post_tags_tag_id;
DROP INDEX comments_post_id;
DROP INDEX posts_created_at;
"#,
    },
];

/// Every migration known for the backend called `backend_name`, oldest first.
pub fn all(backend_name: &str) -> &'static [Migration] {
    match backend_name {
        "sqlite" => SQLITE_MIGRATIONS,
        _ => &[],
    }
}

/// Names of the applied migrations, oldest first.
pub fn applied(conn: &(impl ConnectionMethods + ?Sized)) -> Result<Vec<String>> {
    conn.applied_migrations()
}

/// Migrations not yet applied, in the order they would be applied.
pub fn unapplied<C>(conn: &C) -> Result<Vec<&'static Migration>>
where
    C: BackendConnection + ?Sized,
{
    let applied = conn.applied_migrations()?;
    Ok(all(conn.backend_name())
        .iter()
        .filter(|m| !applied.iter().any(|a| a == m.name))
        .collect())
}

/// Apply every unapplied migration. Returns how many were applied.
pub fn migrate<C>(conn: &C) -> Result<usize>
where
    C: BackendConnection + ?Sized,
{
    let pending = unapplied(conn)?;
    for m in &pending {
        log::info!("applying migration {}", m.name);
        conn.execute(m.up)?;
        conn.set_migration_applied(m.name, true)?;
    }
    Ok(pending.len())
}

/// Roll back the most recently applied migration, returning its name.
pub fn rollback_latest<C>(conn: &C) -> Result<Option<&'static str>>
where
    C: BackendConnection + ?Sized,
{
    let applied = conn.applied_migrations()?;
    let Some(latest) = applied.last() else {
        return Ok(None);
    };
    let m = find(conn.backend_name(), latest)?;
    rollback_one(conn, m)?;
    Ok(Some(m.name))
}

/// Roll back every migration applied after `name`, leaving `name` itself
/// applied. Returns how many were rolled back.
pub fn rollback_to<C>(conn: &C, name: &str) -> Result<usize>
where
    C: BackendConnection + ?Sized,
{
    let applied = conn.applied_migrations()?;
    let Some(pos) = applied.iter().position(|a| a == name) else {
        return Err(Error::MigrationError(format!(
            "migration {name} is not applied"
        )));
    };
    let mut count = 0;
    for later in applied[pos + 1..].iter().rev() {
        rollback_one(conn, find(conn.backend_name(), later)?)?;
        count += 1;
    }
    Ok(count)
}

/// Roll back every applied migration. Returns how many were rolled back.
pub fn unmigrate<C>(conn: &C) -> Result<usize>
where
    C: BackendConnection + ?Sized,
{
    let applied = conn.applied_migrations()?;
    for name in applied.iter().rev() {
        rollback_one(conn, find(conn.backend_name(), name)?)?;
    }
    Ok(applied.len())
}

fn find(backend_name: &str, name: &str) -> Result<&'static Migration> {
    all(backend_name)
        .iter()
        .find(|m| m.name == name)
        .ok_or_else(|| Error::MigrationError(format!("unknown migration {name}")))
}

fn rollback_one<C>(conn: &C, m: &Migration) -> Result<()>
where
    C: BackendConnection + ?Sized,
{
    log::info!("rolling back migration {}", m.name);
    conn.execute(m.down)?;
    conn.set_migration_applied(m.name, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_ordered_and_unique() {
        let names: Vec<&str> = all("sqlite").iter().map(|m| m.name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn docstore_has_no_migrations() {
        assert!(all("docstore").is_empty());
    }
}
