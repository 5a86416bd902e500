//! SQLite store backend
use std::fmt::Write;
use std::path::Path;

use log::debug;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::helper::{self, COMMENT_COLUMNS, POST_COLUMNS, USER_COLUMNS};
use super::{Backend, BackendConnection, Connection, ConnectionMethods};
use crate::models::{Category, Comment, Id, NewComment, NewPost, NewUser, Post, Tag, User};
use crate::query::{CommentFilter, PostFilter};
use crate::{Error, Result};

/// The name of the sqlite backend.
pub const BACKEND_NAME: &str = "sqlite";

const MIGRATIONS_TABLE: &str = "quill_migrations";

/// SQLite [`Backend`] implementation.
#[derive(Debug, Default, Clone)]
pub struct SQLiteBackend;
impl SQLiteBackend {
    /// Create the backend.
    pub fn new() -> SQLiteBackend {
        SQLiteBackend {}
    }
}
impl SQLiteBackend {
    fn connect(&self, path: &str) -> Result<SQLiteConnection> {
        let connection = SQLiteConnection::open(Path::new(path))?;
        connection.execute("PRAGMA foreign_keys = ON")?;
        connection.register_functions()?;
        Ok(connection)
    }
}

impl Backend for SQLiteBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn connect(&self, path: &str) -> Result<Connection> {
        Ok(Connection::new(self.connect(path)?))
    }
}

/// SQLite store connection.
#[derive(Debug)]
pub struct SQLiteConnection {
    conn: rusqlite::Connection,
}
impl SQLiteConnection {
    fn open(path: impl AsRef<Path>) -> Result<Self> {
        rusqlite::Connection::open(path)
            .map(|conn| SQLiteConnection { conn })
            .map_err(|e| e.into())
    }

    /// Installs `unicode_lower`, used by search. The builtin `lower()`
    /// only folds ASCII letters.
    fn register_functions(&self) -> Result<()> {
        self.conn.create_scalar_function(
            "unicode_lower",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| Ok(ctx.get::<Option<String>>(0)?.map(|s| s.to_lowercase())),
        )?;
        Ok(())
    }

    // For use with connection_method_wrapper macro
    #[allow(clippy::unnecessary_wraps)]
    fn wrapped_connection_methods(&self) -> Result<&rusqlite::Connection> {
        Ok(&self.conn)
    }
}
crate::connection_method_wrapper!(SQLiteConnection);

impl BackendConnection for SQLiteConnection {
    fn backend(&self) -> Box<dyn Backend> {
        Box::new(SQLiteBackend {})
    }
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }
    fn is_closed(&self) -> bool {
        false
    }
}

impl ConnectionMethods for rusqlite::Connection {
    fn execute(&self, sql: &str) -> Result<()> {
        debug!("execute sql {}", sql);
        self.execute_batch(sql)?;
        Ok(())
    }

    fn has_table(&self, table: &str) -> Result<bool> {
        let mut stmt =
            self.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?;")?;
        let mut rows = stmt.query([table])?;
        Ok(rows.next()?.is_some())
    }

    fn applied_migrations(&self) -> Result<Vec<String>> {
        if !self.has_table(MIGRATIONS_TABLE)? {
            return Ok(Vec::new());
        }
        let mut stmt = self.prepare(&format!(
            "SELECT name FROM {MIGRATIONS_TABLE} ORDER BY rowid"
        ))?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }

    fn set_migration_applied(&self, name: &str, applied: bool) -> Result<()> {
        self.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {MIGRATIONS_TABLE} (
                name TEXT NOT NULL PRIMARY KEY,
                applied_at TEXT NOT NULL
            );"
        ))?;
        if applied {
            self.execute(
                &format!("INSERT OR IGNORE INTO {MIGRATIONS_TABLE} (name, applied_at) VALUES (?, ?)"),
                params![name, crate::models::now()],
            )?;
        } else {
            self.execute(
                &format!("DELETE FROM {MIGRATIONS_TABLE} WHERE name = ?"),
                [name],
            )?;
        }
        Ok(())
    }

    fn insert_user(&self, user: &NewUser) -> Result<User> {
        debug!("insert user {}", user.username);
        self.execute(
            "INSERT INTO users (username, email, password_hash, bio, joined_at, last_login, is_admin)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.bio,
                user.joined_at,
                user.joined_at,
                user.is_admin
            ],
        )?;
        Ok(User {
            id: self.last_insert_rowid(),
            username: user.username.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            bio: user.bio.clone(),
            joined_at: user.joined_at,
            last_login: user.joined_at,
            is_admin: user.is_admin,
        })
    }

    fn get_user(&self, id: Id) -> Result<Option<User>> {
        self.user_where("id = ?", Value::Integer(id))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.user_where("email = ?", Value::Text(email.to_string()))
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_where("username = ?", Value::Text(username.to_string()))
    }

    fn update_user(&self, user: &User) -> Result<()> {
        debug!("update user {}", user.id);
        let changed = self.execute(
            "UPDATE users SET username = ?, email = ?, password_hash = ?, bio = ?,
             joined_at = ?, last_login = ?, is_admin = ? WHERE id = ?",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.bio,
                user.joined_at,
                user.last_login,
                user.is_admin,
                user.id
            ],
        )?;
        expect_changed(changed)
    }

    fn delete_user(&self, id: Id) -> Result<()> {
        debug!("delete user {id}");
        expect_changed(self.execute("DELETE FROM users WHERE id = ?", [id])?)
    }

    fn users(&self) -> Result<Vec<User>> {
        let mut sql = String::new();
        helper::sql_select(USER_COLUMNS, "users", &mut sql);
        sql.write_str(" ORDER BY id").unwrap();
        let mut stmt = self.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<rusqlite::Result<Vec<User>>>()?;
        Ok(users)
    }

    fn insert_category(&self, name: &str, description: Option<&str>) -> Result<Category> {
        debug!("insert category {name}");
        self.execute(
            "INSERT INTO categories (name, description) VALUES (?, ?)",
            params![name, description],
        )?;
        Ok(Category {
            id: self.last_insert_rowid(),
            name: name.to_string(),
            description: description.map(str::to_string),
        })
    }

    fn get_category(&self, id: Id) -> Result<Option<Category>> {
        self.query_row(
            "SELECT id, name, description FROM categories WHERE id = ?",
            [id],
            category_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn find_category(&self, name: &str) -> Result<Option<Category>> {
        self.query_row(
            "SELECT id, name, description FROM categories WHERE name = ?",
            [name],
            category_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn categories(&self) -> Result<Vec<Category>> {
        let mut stmt = self.prepare("SELECT id, name, description FROM categories ORDER BY name")?;
        let categories = stmt
            .query_map([], category_from_row)?
            .collect::<rusqlite::Result<Vec<Category>>>()?;
        Ok(categories)
    }

    fn insert_tag(&self, name: &str) -> Result<Tag> {
        debug!("insert tag {name}");
        self.execute("INSERT INTO tags (name) VALUES (?)", [name])?;
        Ok(Tag {
            id: self.last_insert_rowid(),
            name: name.to_string(),
        })
    }

    fn get_tag(&self, id: Id) -> Result<Option<Tag>> {
        self.query_row("SELECT id, name FROM tags WHERE id = ?", [id], tag_from_row)
            .optional()
            .map_err(Error::from)
    }

    fn find_tag(&self, name: &str) -> Result<Option<Tag>> {
        self.query_row("SELECT id, name FROM tags WHERE name = ?", [name], tag_from_row)
            .optional()
            .map_err(Error::from)
    }

    fn tags(&self) -> Result<Vec<Tag>> {
        let mut stmt = self.prepare("SELECT id, name FROM tags ORDER BY name")?;
        let tags = stmt
            .query_map([], tag_from_row)?
            .collect::<rusqlite::Result<Vec<Tag>>>()?;
        Ok(tags)
    }

    fn insert_post(&self, post: &NewPost) -> Result<Post> {
        debug!("insert post {}", post.slug);
        let tx = self.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO posts (title, body, slug, author_id, category_id, published, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                post.title,
                post.body,
                post.slug,
                post.author_id,
                post.category_id,
                post.published,
                post.created_at,
                post.created_at
            ],
        )?;
        let id = tx.last_insert_rowid();
        let tags = set_post_tags(&tx, id, &post.tags)?;
        tx.commit()?;
        Ok(Post {
            id,
            title: post.title.clone(),
            body: post.body.clone(),
            slug: post.slug.clone(),
            author_id: post.author_id,
            category_id: post.category_id,
            tags,
            published: post.published,
            created_at: post.created_at,
            updated_at: post.created_at,
        })
    }

    fn get_post(&self, id: Id) -> Result<Option<Post>> {
        self.post_where("id = ?", Value::Integer(id))
    }

    fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.post_where("slug = ?", Value::Text(slug.to_string()))
    }

    fn update_post(&self, post: &Post) -> Result<()> {
        debug!("update post {}", post.id);
        let tx = self.unchecked_transaction()?;
        let changed = tx.execute(
            "UPDATE posts SET title = ?, body = ?, slug = ?, author_id = ?, category_id = ?,
             published = ?, created_at = ?, updated_at = ? WHERE id = ?",
            params![
                post.title,
                post.body,
                post.slug,
                post.author_id,
                post.category_id,
                post.published,
                post.created_at,
                post.updated_at,
                post.id
            ],
        )?;
        expect_changed(changed)?;
        set_post_tags(&tx, post.id, &post.tags)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_post(&self, id: Id) -> Result<()> {
        debug!("delete post {id}");
        expect_changed(self.execute("DELETE FROM posts WHERE id = ?", [id])?)
    }

    fn query_posts(
        &self,
        filter: &PostFilter,
        limit: Option<u32>,
        offset: Option<u64>,
    ) -> Result<Vec<Post>> {
        let mut sql = String::new();
        let mut values: Vec<Value> = Vec::new();
        helper::sql_select(POST_COLUMNS, "posts", &mut sql);
        helper::sql_post_filter(filter, &mut values, &mut sql);
        helper::sql_post_order(&mut sql);
        helper::sql_limit_offset(limit, offset, &mut sql);
        debug!("query sql {}", sql);
        let mut stmt = self.prepare(&sql)?;
        let mut posts = stmt
            .query_map(params_from_iter(values), post_from_row)?
            .collect::<rusqlite::Result<Vec<Post>>>()?;
        for post in &mut posts {
            post.tags = post_tags(self, post.id)?;
        }
        Ok(posts)
    }

    fn count_posts(&self, filter: &PostFilter) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) FROM posts");
        let mut values: Vec<Value> = Vec::new();
        helper::sql_post_filter(filter, &mut values, &mut sql);
        debug!("count sql {}", sql);
        let count: i64 = self.query_row(&sql, params_from_iter(values), |row| row.get(0))?;
        Ok(count as u64)
    }

    fn insert_comment(&self, comment: &NewComment) -> Result<Comment> {
        debug!("insert comment on post {}", comment.post_id);
        self.execute(
            "INSERT INTO comments (body, author_id, post_id, parent_id, approved, created_at, updated_at)
             VALUES (?, ?, ?, ?, 1, ?, ?)",
            params![
                comment.body,
                comment.author_id,
                comment.post_id,
                comment.parent_id,
                comment.created_at,
                comment.created_at
            ],
        )?;
        Ok(Comment {
            id: self.last_insert_rowid(),
            body: comment.body.clone(),
            author_id: comment.author_id,
            post_id: comment.post_id,
            parent_id: comment.parent_id,
            approved: true,
            created_at: comment.created_at,
            updated_at: comment.created_at,
        })
    }

    fn get_comment(&self, id: Id) -> Result<Option<Comment>> {
        let mut sql = String::new();
        helper::sql_select(COMMENT_COLUMNS, "comments", &mut sql);
        sql.write_str(" WHERE id = ?").unwrap();
        self.query_row(&sql, [id], comment_from_row)
            .optional()
            .map_err(Error::from)
    }

    fn query_comments(&self, filter: &CommentFilter) -> Result<Vec<Comment>> {
        let mut sql = String::new();
        let mut values: Vec<Value> = Vec::new();
        let mut conditions: Vec<&str> = Vec::new();
        helper::sql_select(COMMENT_COLUMNS, "comments", &mut sql);
        if let Some(post) = filter.post {
            conditions.push("post_id = ?");
            values.push(Value::Integer(post));
        }
        if let Some(author) = filter.author {
            conditions.push("author_id = ?");
            values.push(Value::Integer(author));
        }
        if !conditions.is_empty() {
            write!(sql, " WHERE {}", conditions.join(" AND ")).unwrap();
        }
        sql.write_str(" ORDER BY created_at, id").unwrap();
        debug!("query sql {}", sql);
        let mut stmt = self.prepare(&sql)?;
        let comments = stmt
            .query_map(params_from_iter(values), comment_from_row)?
            .collect::<rusqlite::Result<Vec<Comment>>>()?;
        Ok(comments)
    }

    fn delete_comment(&self, id: Id) -> Result<()> {
        debug!("delete comment {id}");
        expect_changed(self.execute("DELETE FROM comments WHERE id = ?", [id])?)
    }
}

trait RowLookup {
    fn user_where(&self, condition: &str, value: Value) -> Result<Option<User>>;
    fn post_where(&self, condition: &str, value: Value) -> Result<Option<Post>>;
}
impl RowLookup for rusqlite::Connection {
    fn user_where(&self, condition: &str, value: Value) -> Result<Option<User>> {
        let mut sql = String::new();
        helper::sql_select(USER_COLUMNS, "users", &mut sql);
        write!(sql, " WHERE {condition}").unwrap();
        self.query_row(&sql, [value], user_from_row)
            .optional()
            .map_err(Error::from)
    }

    fn post_where(&self, condition: &str, value: Value) -> Result<Option<Post>> {
        let mut sql = String::new();
        helper::sql_select(POST_COLUMNS, "posts", &mut sql);
        write!(sql, " WHERE {condition}").unwrap();
        let post = self
            .query_row(&sql, [value], post_from_row)
            .optional()?;
        match post {
            Some(mut post) => {
                post.tags = post_tags(self, post.id)?;
                Ok(Some(post))
            }
            None => Ok(None),
        }
    }
}

fn expect_changed(changed: usize) -> Result<()> {
    if changed == 0 {
        Err(Error::NoSuchObject)
    } else {
        Ok(())
    }
}

fn post_tags(conn: &rusqlite::Connection, post_id: Id) -> Result<Vec<Id>> {
    let mut stmt = conn.prepare("SELECT tag_id FROM post_tags WHERE post_id = ? ORDER BY tag_id")?;
    let tags = stmt
        .query_map([post_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<Id>>>()?;
    Ok(tags)
}

/// Replace the tags of `post_id`, returning the stored set in ascending order.
fn set_post_tags(conn: &rusqlite::Connection, post_id: Id, tags: &[Id]) -> Result<Vec<Id>> {
    conn.execute("DELETE FROM post_tags WHERE post_id = ?", [post_id])?;
    let mut stmt = conn.prepare("INSERT OR IGNORE INTO post_tags (post_id, tag_id) VALUES (?, ?)")?;
    for tag in tags {
        stmt.execute([post_id, *tag])?;
    }
    let mut stored = tags.to_vec();
    stored.sort_unstable();
    stored.dedup();
    Ok(stored)
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        bio: row.get(4)?,
        joined_at: row.get(5)?,
        last_login: row.get(6)?,
        is_admin: row.get(7)?,
    })
}

fn post_from_row(row: &Row) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        slug: row.get(3)?,
        author_id: row.get(4)?,
        category_id: row.get(5)?,
        tags: Vec::new(),
        published: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn comment_from_row(row: &Row) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        body: row.get(1)?,
        author_id: row.get(2)?,
        post_id: row.get(3)?,
        parent_id: row.get(4)?,
        approved: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn category_from_row(row: &Row) -> rusqlite::Result<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn tag_from_row(row: &Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}
